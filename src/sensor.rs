//! # Tilt Sensor
//!
//! Contract of the motion-sensor collaborator whose tilt angles feed the
//! sensor-data frame. The angles are passed through to the wire unconverted.
//!
//! [`GravityTiltSensor`] derives roll and pitch from a low-passed
//! acceleration vector; [`NullTiltSensor`] stands in when no sensor is
//! fitted and keeps the data stream silent.

use crate::signal::SampleBuffer;

/// Low-pass corner frequency applied to acceleration samples.
const CUTOFF_HZ: f32 = 5.0;

/// Motion sensor as seen by the control loop.
pub trait TiltSensor: Send {
    /// Acquire and process one sample.
    fn update(&mut self);

    /// Whether the last update produced valid angles.
    fn is_working(&self) -> bool;

    /// Tilt angles (x, y, z) in degrees, relative to the last re-zero.
    fn tilt(&self) -> [f32; 3];

    /// Take the current orientation as the new zero.
    fn rezero(&mut self);
}

/// Sensor that never works.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTiltSensor;

impl TiltSensor for NullTiltSensor {
    fn update(&mut self) {}

    fn is_working(&self) -> bool {
        false
    }

    fn tilt(&self) -> [f32; 3] {
        [0.0; 3]
    }

    fn rezero(&mut self) {}
}

/// Tilt from the gravity vector.
///
/// Each axis is smoothed by a Butterworth low-pass. Readings taken while the
/// device is upside down (z acceleration not positive) are rejected and mark
/// the sensor as not working. Heading is not observable from gravity and
/// stays at zero.
#[derive(Debug, Clone)]
pub struct GravityTiltSensor {
    acceleration: [f32; 3],
    axes: [SampleBuffer; 3],
    angles: [f32; 3],
    offset: [f32; 3],
    working: bool,
}

impl GravityTiltSensor {
    /// Create a sensor sampled every `sample_period_us` microseconds.
    pub fn new(sample_period_us: u32) -> Self {
        let axes = std::array::from_fn(|_| {
            let mut axis = SampleBuffer::new();
            axis.configure_butterworth(CUTOFF_HZ, sample_period_us as f32);
            axis
        });
        Self {
            acceleration: [0.0; 3],
            axes,
            angles: [0.0; 3],
            offset: [0.0; 3],
            working: false,
        }
    }

    /// Set the raw acceleration picked up by the next [`update`](TiltSensor::update).
    pub fn set_acceleration(&mut self, acceleration: [f32; 3]) {
        self.acceleration = acceleration;
    }
}

impl TiltSensor for GravityTiltSensor {
    fn update(&mut self) {
        let mut filtered = [0.0f32; 3];
        for ((axis, raw), out) in self.axes.iter_mut().zip(self.acceleration).zip(filtered.iter_mut()) {
            axis.update(raw);
            *out = axis.filter_lowpass();
        }

        let [x, y, z] = filtered;
        if z <= 0.0 {
            self.working = false;
            return;
        }

        let roll = y.atan2(z).to_degrees();
        let pitch = (-x).atan2((y * y + z * z).sqrt()).to_degrees();
        self.angles = [roll, pitch, 0.0];
        self.working = true;
    }

    fn is_working(&self) -> bool {
        self.working
    }

    fn tilt(&self) -> [f32; 3] {
        std::array::from_fn(|i| self.angles[i] - self.offset[i])
    }

    fn rezero(&mut self) {
        self.offset = self.angles;
    }
}
