//! Volume with logarithmic gain
//!
//! The stored level is the user-facing value in `[0, 1]`. The output receives a
//! gain on a dB scale so equal steps sound like equal changes:
//! 0.0 mutes, anything else maps linearly onto -60 dB..0 dB.

/// Clamp a requested volume into `[0, 1]`; NaN becomes silence
pub fn clamp(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Volume level plus its cached output gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    level: f32,
    gain: f32,
}

impl Volume {
    pub fn new(level: f32) -> Self {
        let level = clamp(level);
        Self {
            level,
            gain: Self::linear_gain(level),
        }
    }

    /// Set the level, clamped into `[0, 1]`
    ///
    /// Returns the stored value.
    pub fn set_level(&mut self, level: f32) -> f32 {
        self.level = clamp(level);
        self.gain = Self::linear_gain(self.level);
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Linear gain multiplier handed to the output
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Gain in dB; -60 for silence
    pub fn to_db(&self) -> f32 {
        if self.gain == 0.0 {
            -60.0
        } else {
            20.0 * self.gain.log10()
        }
    }

    /// gain = 10^((level - 1) * 60 / 20)
    fn linear_gain(level: f32) -> f32 {
        if level == 0.0 {
            return 0.0;
        }
        let db = (level - 1.0) * 60.0;
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_level_clamps() {
        let mut vol = Volume::new(0.5);
        assert_eq!(vol.set_level(-1.0), 0.0);
        assert_eq!(vol.set_level(5.0), 1.0);
        assert_eq!(vol.set_level(f32::NAN), 0.0);
        assert_eq!(vol.set_level(0.25), 0.25);
    }

    #[test]
    fn gain_calculation() {
        assert_eq!(Volume::new(0.0).gain(), 0.0);
        assert!((Volume::new(1.0).gain() - 1.0).abs() < 0.001);
        // Half way is -30 dB
        assert!((Volume::new(0.5).gain() - 0.0316).abs() < 0.001);
        // Default is -12 dB
        assert!((Volume::default().gain() - 0.251).abs() < 0.01);
    }

    #[test]
    fn db_conversion() {
        assert!(Volume::new(1.0).to_db().abs() < 0.1);
        assert!((Volume::new(0.0).to_db() + 60.0).abs() < 0.1);
        assert!((Volume::new(0.5).to_db() + 30.0).abs() < 0.1);
    }
}
