//! Differential atmospheric refraction.
//!
//! The refractive index of air follows Filippenko (1982): the Edlén formula
//! at 15 C and 760 mmHg, scaled to the observed temperature and pressure and
//! reduced by the water-vapour term.

use serde::{Deserialize, Serialize};

use crate::consts::ARCSEC_PER_DEGREE;

const RAD_TO_ARCSEC: f64 = 206_264.806_247_096_36;
const HPA_TO_MMHG: f64 = 0.750_061_683;

/// Wavelength dependent positional offset caused by the atmosphere.
pub trait DarCorrector: Send + Sync {
    /// `(delta_ra, delta_dec)` in degrees to add to the sky position of light
    /// observed at `wave` (Angstrom).
    fn correction(&self, wave: f64) -> (f64, f64);
}

/// Observing conditions of one exposure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DarParams {
    /// Wavelength (Angstrom) at which the correction vanishes.
    pub wave_ref: f64,
    /// Air temperature in Celsius.
    pub temperature: f64,
    /// Air pressure in hPa.
    pub pressure: f64,
    /// Relative humidity in `[0, 1]`.
    pub humidity: f64,
    /// Hour angle of the target in degrees.
    pub hour_angle: f64,
    /// Declination of the target in degrees.
    pub dec: f64,
    /// Geodetic latitude of the observatory in degrees.
    pub latitude: f64,
}

impl Default for DarParams {
    fn default() -> Self {
        Self {
            wave_ref: 5500.0,
            temperature: 10.0,
            pressure: 760.0,
            humidity: 0.2,
            hour_angle: 0.0,
            dec: 0.0,
            latitude: -24.6,
        }
    }
}

/// Refraction correction for a target at a fixed hour angle.
#[derive(Clone, Debug)]
pub struct DarCorrection {
    params: Option<DarParams>,
    tan_zenith: f64,
    /// Sine and cosine of the parallactic angle (north through east).
    sin_q: f64,
    cos_q: f64,
    cos_dec: f64,
    ref_index: f64,
}

impl DarCorrection {
    pub fn new(params: DarParams) -> Self {
        let h = params.hour_angle.to_radians();
        let dec = params.dec.to_radians();
        let lat = params.latitude.to_radians();

        let cos_z = lat.sin() * dec.sin() + lat.cos() * dec.cos() * h.cos();
        let z = cos_z.clamp(-1.0, 1.0).acos();
        let q = h.sin().atan2(lat.tan() * dec.cos() - dec.sin() * h.cos());

        let ref_index = refractivity(params.wave_ref, &params);
        Self {
            tan_zenith: z.tan(),
            sin_q: q.sin(),
            cos_q: q.cos(),
            cos_dec: dec.cos(),
            ref_index,
            params: Some(params),
        }
    }

    /// Correction that is identically zero.
    pub fn none() -> Self {
        Self {
            params: None,
            tan_zenith: 0.0,
            sin_q: 0.0,
            cos_q: 1.0,
            cos_dec: 1.0,
            ref_index: 0.0,
        }
    }

    pub fn params(&self) -> Option<&DarParams> {
        self.params.as_ref()
    }

    pub fn airmass(&self) -> f64 {
        (1.0 + self.tan_zenith * self.tan_zenith).sqrt()
    }

    /// Parallactic angle in degrees.
    pub fn parallactic_angle(&self) -> f64 {
        self.sin_q.atan2(self.cos_q).to_degrees()
    }

    /// Refraction at `wave` relative to the reference wavelength, in arcsec.
    pub fn differential_refraction(&self, wave: f64) -> f64 {
        match &self.params {
            Some(p) => (refractivity(wave, p) - self.ref_index) * self.tan_zenith * RAD_TO_ARCSEC,
            None => 0.0,
        }
    }
}

impl DarCorrector for DarCorrection {
    fn correction(&self, wave: f64) -> (f64, f64) {
        if self.params.is_none() {
            return (0.0, 0.0);
        }
        // Light is lifted towards the zenith; undo the lift.
        let shift = -self.differential_refraction(wave) / ARCSEC_PER_DEGREE;
        let dra = if self.cos_dec == 0.0 {
            0.0
        } else {
            shift * self.sin_q / self.cos_dec
        };
        (dra, shift * self.cos_q)
    }
}

/// `n - 1` for moist air at `wave` Angstrom.
fn refractivity(wave: f64, p: &DarParams) -> f64 {
    let sigma2 = {
        let inv_um = 1.0e4 / wave;
        inv_um * inv_um
    };
    let t = p.temperature;
    let pres = p.pressure * HPA_TO_MMHG;

    let dry_std = 64.328 + 29498.1 / (146.0 - sigma2) + 255.4 / (41.0 - sigma2);
    let dry = dry_std * pres * (1.0 + (1.049 - 0.0157 * t) * 1.0e-6 * pres)
        / (720.883 * (1.0 + 0.003661 * t));

    // Saturation vapour pressure (Magnus), hPa -> mmHg.
    let sat = 6.1078 * (17.27 * t / (t + 237.3)).exp() * HPA_TO_MMHG;
    let vapour = p.humidity.clamp(0.0, 1.0) * sat;
    let wet = (0.0624 - 0.000680 * sigma2) / (1.0 + 0.003661 * t) * vapour;

    (dry - wet) * 1.0e-6
}
