//! Encoder progress parsing and reporting.
//!
//! ffmpeg run with `-progress pipe:2` prints blocks of `key=value` lines,
//! each terminated by `progress=continue` or `progress=end`. A
//! [`ProgressParser`] folds those lines into [`EncodeProgress`] snapshots.

/// Sender for reporting progress out of a long-running stage.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// short label for what is being worked on.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Progress stats from one ffmpeg progress block.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// 0.0..=1.0
    pub pct: f64,
    pub out_time_secs: f64,
    pub fps: Option<f64>,
    pub bitrate: Option<String>,
    pub speed: Option<String>,
    pub total_size: Option<u64>,
    pub frame: Option<u64>,
    /// Set on the final `progress=end` block.
    pub finished: bool,
}

impl EncodeProgress {
    /// Percent complete, 0.0 -- 100.0.
    pub fn percent(&self) -> f32 {
        (self.pct * 100.0) as f32
    }

    /// Estimated seconds remaining, from the reported `speed=1.5x`.
    pub fn eta_secs(&self, duration_secs: f64) -> Option<f64> {
        let speed = self.speed.as_deref()?.trim_end_matches('x').trim().parse::<f64>().ok()?;
        if speed <= 0.0 || duration_secs <= 0.0 {
            return None;
        }
        Some(((duration_secs - self.out_time_secs).max(0.0)) / speed)
    }
}

/// Stateful parser for ffmpeg `-progress` output.
#[derive(Debug, Default)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    out_time_secs: Option<f64>,
    fps: Option<f64>,
    bitrate: Option<String>,
    speed: Option<String>,
    total_size: Option<u64>,
    frame: Option<u64>,
}

impl ProgressParser {
    /// `duration_secs` is the source duration used to compute percentage.
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs: duration_secs.filter(|d| *d > 0.0),
            ..Self::default()
        }
    }

    /// Feed one line; returns a snapshot at the end of each block.
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();

        match key {
            // ffmpeg reports out_time_ms in microseconds as well.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_secs = Some(us.max(0) as f64 / 1_000_000.0);
                }
            }
            "out_time" => {
                if self.out_time_secs.is_none() {
                    self.out_time_secs = parse_timestamp(value);
                }
            }
            "fps" => self.fps = value.parse::<f64>().ok(),
            "bitrate" => self.bitrate = available(value),
            "speed" => self.speed = available(value),
            "total_size" => self.total_size = value.parse::<u64>().ok(),
            "frame" => self.frame = value.parse::<u64>().ok(),
            "progress" => return Some(self.snapshot(value == "end")),
            _ => {}
        }
        None
    }

    fn snapshot(&mut self, finished: bool) -> EncodeProgress {
        let out_time_secs = self.out_time_secs.unwrap_or(0.0);
        let pct = match (finished, self.duration_secs) {
            (true, _) => 1.0,
            (false, Some(dur)) => (out_time_secs / dur).clamp(0.0, 1.0),
            (false, None) => 0.0,
        };

        let progress = EncodeProgress {
            pct,
            out_time_secs,
            fps: self.fps,
            bitrate: self.bitrate.clone(),
            speed: self.speed.clone(),
            total_size: self.total_size,
            frame: self.frame,
            finished,
        };
        // Each block restates its timestamp; the -ms/-us keys win within a block.
        self.out_time_secs = None;
        progress
    }
}

fn available(value: &str) -> Option<String> {
    (value != "N/A" && !value.is_empty()).then(|| value.to_string())
}

/// Parse `HH:MM:SS.ffffff` into seconds.
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.splitn(3, ':');
    let h = parts.next()?.parse::<f64>().ok()?;
    let m = parts.next()?.parse::<f64>().ok()?;
    let s = parts.next()?.parse::<f64>().ok()?;
    let total = h * 3600.0 + m * 60.0 + s;
    (total >= 0.0).then_some(total)
}
