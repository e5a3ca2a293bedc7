//! Coarse `(message, fraction)` progress reporting

use std::fmt;
use std::sync::Arc;

/// Callback receiving a status message and a completion fraction in `[0, 1]`
pub type ProgressCallback = Arc<dyn Fn(&str, f32) + Send + Sync>;

/// Progress sink, possibly mapped onto a sub-range of a parent's progress
#[derive(Clone)]
pub struct Progress {
    callback: Option<ProgressCallback>,
    start: f32,
    span: f32,
}

impl Progress {
    /// Report through `callback`
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str, f32) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
            start: 0.0,
            span: 1.0,
        }
    }

    /// Discard all reports
    pub fn none() -> Self {
        Self {
            callback: None,
            start: 0.0,
            span: 1.0,
        }
    }

    /// Report `fraction` of this range as done
    pub fn report(&self, message: &str, fraction: f32) {
        if let Some(callback) = &self.callback {
            let fraction = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            };
            callback(message, self.start + self.span * fraction);
        }
    }

    /// Progress whose `[0, 1]` maps onto `[from, to]` of this one
    pub fn sub_range(&self, from: f32, to: f32) -> Progress {
        let from = from.clamp(0.0, 1.0);
        let to = to.clamp(from, 1.0);
        Progress {
            callback: self.callback.clone(),
            start: self.start + self.span * from,
            span: self.span * (to - from),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("start", &self.start)
            .field("span", &self.span)
            .field("reporting", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (Progress, Arc<Mutex<Vec<(String, f32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new(move |message, fraction| {
            sink.lock().unwrap().push((message.to_string(), fraction));
        });
        (progress, seen)
    }

    #[test]
    fn test_sub_ranges_nest() {
        let (progress, seen) = recording();
        let download = progress.sub_range(0.2, 0.6);
        download.report("Downloading", 0.5);
        download.sub_range(0.5, 1.0).report("Downloading", 1.0);

        let seen = seen.lock().unwrap();
        assert!((seen[0].1 - 0.4).abs() < 1e-6);
        assert!((seen[1].1 - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_fraction_is_clamped() {
        let (progress, seen) = recording();
        progress.report("over", 3.0);
        progress.report("nan", f32::NAN);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1, 1.0);
        assert_eq!(seen[1].1, 0.0);
    }

    #[test]
    fn test_none_is_silent() {
        Progress::none().sub_range(0.1, 0.2).report("nothing", 0.5);
    }
}
