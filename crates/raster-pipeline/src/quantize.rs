//! Affine quantization of physical values to 8-bit codes.
//!
//! ```text
//! code = round((value - physical_min) / (physical_max - physical_min)
//!              * (code_max - code_min) + code_min)
//! ```
//!
//! Values outside the physical range saturate to `code_min` / `code_max`.
//! Nodata bypasses the formula and maps to `nodata_code`, which must lie
//! outside `[code_min, code_max]`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{ClippedRaster, EncodedTile};

/// Affine mapping from physical units to byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationProfile {
    pub physical_min: f64,
    pub physical_max: f64,
    pub code_min: u8,
    pub code_max: u8,
    pub nodata_code: u8,
}

impl Default for QuantizationProfile {
    /// Tropospheric NO2 column, molecules/cm^2.
    fn default() -> Self {
        Self {
            physical_min: 0.0,
            physical_max: 1.0e16,
            code_min: 1,
            code_max: 255,
            nodata_code: 0,
        }
    }
}

impl QuantizationProfile {
    /// Default code range over `[0, physical_max]`.
    pub fn with_physical_max(physical_max: f64) -> Self {
        Self {
            physical_max,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.physical_min.is_finite() || !self.physical_max.is_finite() {
            return Err(PipelineError::InvalidProfile(
                "physical range must be finite".to_string(),
            ));
        }
        if self.physical_max <= self.physical_min {
            return Err(PipelineError::InvalidProfile(format!(
                "physical_max {} must exceed physical_min {}",
                self.physical_max, self.physical_min
            )));
        }
        if self.code_max <= self.code_min {
            return Err(PipelineError::InvalidProfile(format!(
                "code_max {} must exceed code_min {}",
                self.code_max, self.code_min
            )));
        }
        if (self.code_min..=self.code_max).contains(&self.nodata_code) {
            return Err(PipelineError::InvalidProfile(format!(
                "nodata_code {} lies inside valid code range [{}, {}]",
                self.nodata_code, self.code_min, self.code_max
            )));
        }
        Ok(())
    }

    /// Code for one physical value; NaN is treated as nodata.
    #[inline]
    pub fn encode_value(&self, value: f64) -> u8 {
        if value.is_nan() {
            return self.nodata_code;
        }
        if value <= self.physical_min {
            return self.code_min;
        }
        if value >= self.physical_max {
            return self.code_max;
        }

        let span = (self.code_max - self.code_min) as f64;
        let scaled = (value - self.physical_min) / (self.physical_max - self.physical_min) * span
            + self.code_min as f64;
        scaled
            .round()
            .clamp(self.code_min as f64, self.code_max as f64) as u8
    }

    /// Code for one pixel; `None` is nodata.
    #[inline]
    pub fn encode(&self, value: Option<f32>) -> u8 {
        match value {
            Some(v) => self.encode_value(v as f64),
            None => self.nodata_code,
        }
    }

    /// Physical value a code stands for; `None` for nodata or out-of-range codes.
    pub fn decode(&self, code: u8) -> Option<f64> {
        if code < self.code_min || code > self.code_max {
            return None;
        }
        let span = (self.code_max - self.code_min) as f64;
        Some(
            self.physical_min
                + (code - self.code_min) as f64 / span * (self.physical_max - self.physical_min),
        )
    }
}

/// Quantize a clipped raster into an 8-bit tile.
///
/// `block_size` is the square tile edge of the written GeoTIFF; TIFF requires
/// a multiple of 16.
pub fn encode(
    clipped: &ClippedRaster,
    profile: &QuantizationProfile,
    block_size: u32,
) -> Result<EncodedTile> {
    profile.validate()?;
    if block_size == 0 || block_size % 16 != 0 {
        return Err(PipelineError::Config(format!(
            "block size {} must be a positive multiple of 16",
            block_size
        )));
    }

    let codes: Vec<u8> = clipped
        .values
        .par_iter()
        .map(|v| profile.encode(*v))
        .collect();

    Ok(EncodedTile {
        codes,
        width: clipped.width,
        height: clipped.height,
        georef: clipped.georef,
        block_size,
        profile: *profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_values() {
        let profile = QuantizationProfile::default();
        assert_eq!(profile.encode(Some(5.0e15)), 128);
        assert_eq!(profile.encode(Some(2.0e16)), 255);
        assert_eq!(profile.encode(None), 0);
        assert_eq!(profile.encode(Some(0.0)), 1);
        assert_eq!(profile.encode(Some(1.0e16)), 255);
    }

    #[test]
    fn test_clamping_law() {
        let profile = QuantizationProfile::default();
        for v in [-1.0e20, -5.0, -f64::MIN_POSITIVE] {
            assert_eq!(profile.encode_value(v), profile.code_min);
        }
        for v in [1.0000001e16, 3.0e16, f64::MAX] {
            assert_eq!(profile.encode_value(v), profile.code_max);
        }
        assert_eq!(profile.encode_value(f64::INFINITY), profile.code_max);
        assert_eq!(profile.encode_value(f64::NEG_INFINITY), profile.code_min);
    }

    #[test]
    fn test_nodata_never_produced_by_valid_values() {
        let profile = QuantizationProfile::default();
        for i in 0..=1000 {
            let v = -1.0e15 + i as f64 * 1.2e13;
            assert_ne!(profile.encode_value(v), profile.nodata_code);
        }
    }

    #[test]
    fn test_decode_reencode_is_identity() {
        let profile = QuantizationProfile::with_physical_max(5.0e17);
        for code in profile.code_min..=profile.code_max {
            let physical = profile.decode(code).unwrap();
            assert_eq!(profile.encode_value(physical), code);
        }
        assert_eq!(profile.decode(profile.nodata_code), None);
    }

    #[test]
    fn test_validate() {
        assert!(QuantizationProfile::default().validate().is_ok());

        let overlapping = QuantizationProfile {
            nodata_code: 1,
            ..Default::default()
        };
        assert!(matches!(
            overlapping.validate(),
            Err(PipelineError::InvalidProfile(_))
        ));

        let inverted = QuantizationProfile {
            physical_min: 1.0,
            physical_max: 0.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let nodata_above = QuantizationProfile {
            code_min: 0,
            code_max: 254,
            nodata_code: 255,
            ..Default::default()
        };
        assert!(nodata_above.validate().is_ok());
    }
}
