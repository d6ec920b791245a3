// DSP utilities - Output hygiene for the real-time callback

/// Flush values below 1e-15 to zero, denormals are slow on some CPUs
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft saturation into [-1, 1] with tanh
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// First-order low-pass used to smooth parameter changes
///
/// y[n] = y[n-1] + α * (x[n] - y[n-1])
pub struct OnePoleSmoother {
    current: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// `time_constant_ms` is the time to reach ~63% of a step
    pub fn new(initial_value: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let time_constant_samples = time_constant_ms * 0.001 * sample_rate;
        let coefficient = 1.0 / time_constant_samples;

        Self {
            current: initial_value,
            coefficient: coefficient.min(1.0),
        }
    }

    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coefficient * (target - self.current);
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    pub fn get(&self) -> f32 {
        self.current
    }
}
