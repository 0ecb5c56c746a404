use core::iter::FusedIterator;

use crate::error::{Error, Result};

/// Number of classes the linear policy aims for between min and max.
pub const LINEAR_CLASS_TARGET: usize = 16;

/// Increment used when the custom policy is selected by its integer code alone.
pub const DEFAULT_CUSTOM_STEP: usize = 64;

/// Policy generating the size-class boundaries.
///
/// The integer codes accepted by [`SteppingMethod::try_from`] are:
///
/// ```text
///   0 -> Linear     min, min + d, min + 2d, ...   d = (max - min) / 16
///   1 -> Doubling   min, 2 min, 4 min, ...
///   2 -> Custom     min, min + step, ...          step = 64 unless given
/// ```
///
/// Every policy clips its final step to the maximum block size, so the
/// maximum itself is always the last class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SteppingMethod {
  Linear,
  #[default]
  Doubling,
  Custom { step: usize },
}

impl SteppingMethod {
  /// Integer code of the policy.
  pub fn code(&self) -> usize {
    match self {
      Self::Linear => 0,
      Self::Doubling => 1,
      Self::Custom { .. } => 2,
    }
  }
}

impl TryFrom<usize> for SteppingMethod {
  type Error = Error;

  fn try_from(
    code: usize,
  ) -> Result<Self> {
    match code {
      0 => Ok(Self::Linear),
      1 => Ok(Self::Doubling),
      2 => Ok(Self::Custom {
        step: DEFAULT_CUSTOM_STEP,
      }),
      other => Err(Error::config(format!("unknown stepping method code {other}"))),
    }
  }
}

/// Lazy ascending sequence of block sizes from `min` up to and including `max`.
///
/// Cloning the sequence, or building a new one from the same inputs, yields
/// the same values again.
#[derive(Debug, Clone)]
pub struct StepSequence {
  next: Option<usize>,
  max: usize,
  method: SteppingMethod,
  increment: usize,
}

impl StepSequence {
  pub fn new(
    min_block_size: usize,
    max_block_size: usize,
    method: SteppingMethod,
  ) -> Result<Self> {
    if min_block_size == 0 || max_block_size == 0 {
      return Err(Error::config("block sizes must be non-zero"));
    }

    if min_block_size > max_block_size {
      return Err(Error::config(format!(
        "min_block_size {min_block_size} exceeds max_block_size {max_block_size}"
      )));
    }

    let increment = match method {
      SteppingMethod::Linear => ((max_block_size - min_block_size) / LINEAR_CLASS_TARGET).max(1),
      SteppingMethod::Doubling => 0,
      SteppingMethod::Custom { step: 0 } => {
        return Err(Error::config("custom stepping increment must be non-zero"));
      }
      SteppingMethod::Custom { step } => step,
    };

    Ok(Self {
      next: Some(min_block_size),
      max: max_block_size,
      method,
      increment,
    })
  }
}

impl Iterator for StepSequence {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    let current = self.next?;

    self.next = if current >= self.max {
      None
    } else {
      let stepped = match self.method {
        SteppingMethod::Doubling => current.saturating_mul(2),
        SteppingMethod::Linear | SteppingMethod::Custom { .. } => current.saturating_add(self.increment),
      };

      Some(stepped.min(self.max))
    };

    Some(current)
  }
}

impl FusedIterator for StepSequence {}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn collect(
    min: usize,
    max: usize,
    method: SteppingMethod,
  ) -> Vec<usize> {
    StepSequence::new(min, max, method).unwrap().collect()
  }

  #[test]
  fn test_doubling() {
    assert_eq!(
      collect(16, 4096, SteppingMethod::Doubling),
      vec![16, 32, 64, 128, 256, 512, 1024, 2048, 4096]
    );

    // The last step is clipped to the maximum.
    assert_eq!(
      collect(16, 1000, SteppingMethod::Doubling),
      vec![16, 32, 64, 128, 256, 512, 1000]
    );
  }

  #[test]
  fn test_linear() {
    let sizes = collect(16, 4096, SteppingMethod::Linear);

    assert_eq!(sizes.len(), LINEAR_CLASS_TARGET + 1);
    assert_eq!(sizes[0], 16);
    assert_eq!(sizes[1], 16 + 255);
    assert_eq!(*sizes.last().unwrap(), 4096);

    // Narrow ranges fall back to a one byte increment.
    assert_eq!(collect(8, 12, SteppingMethod::Linear), vec![8, 9, 10, 11, 12]);
  }

  #[test]
  fn test_custom() {
    assert_eq!(
      collect(32, 200, SteppingMethod::Custom { step: 50 }),
      vec![32, 82, 132, 182, 200]
    );
    assert_eq!(SteppingMethod::try_from(2).unwrap(), SteppingMethod::Custom {
      step: DEFAULT_CUSTOM_STEP
    });
  }

  #[test]
  fn test_single_class() {
    for method in [SteppingMethod::Linear, SteppingMethod::Doubling] {
      assert_eq!(collect(64, 64, method), vec![64]);
    }
  }

  #[test]
  fn test_invalid() {
    assert!(matches!(
      StepSequence::new(0, 64, SteppingMethod::Doubling),
      Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
      StepSequence::new(16, 0, SteppingMethod::Doubling),
      Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
      StepSequence::new(128, 64, SteppingMethod::Linear),
      Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
      StepSequence::new(16, 64, SteppingMethod::Custom { step: 0 }),
      Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(SteppingMethod::try_from(3), Err(Error::InvalidConfig(_))));
  }

  #[test]
  fn test_codes() {
    for code in 0..3 {
      assert_eq!(SteppingMethod::try_from(code).unwrap().code(), code);
    }
  }

  #[test]
  fn test_restartable() {
    let sequence = StepSequence::new(24, 5000, SteppingMethod::Linear).unwrap();
    let first: Vec<usize> = sequence.clone().collect();
    let second: Vec<usize> = sequence.collect();

    assert_eq!(first, second);
    assert_eq!(first, collect(24, 5000, SteppingMethod::Linear));
  }

  proptest! {
    #[test]
    fn prop_ascending_and_bounded(
      min in 1usize..4096,
      extra in 0usize..1_000_000,
      code in 0usize..3,
    ) {
      let max = min + extra;
      let method = SteppingMethod::try_from(code).unwrap();
      let sizes = collect(min, max, method);

      prop_assert_eq!(sizes.first().copied(), Some(min));
      prop_assert_eq!(sizes.last().copied(), Some(max));
      prop_assert!(sizes.windows(2).all(|pair| pair[0] < pair[1]));
    }
  }
}
