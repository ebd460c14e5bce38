use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    Global,
    Scoped,
}

impl Lane {
    pub fn operation(self) -> &'static str {
        match self {
            Lane::Global => "global classification",
            Lane::Scoped => "scoped classification",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lane::Global => "global",
            Lane::Scoped => "scoped",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken {
    pub lane: Lane,
    pub seq: u64,
}

/// What happened to a completed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    Applied,
    Failed,
    // A newer request was issued in the lane; the completion changed nothing
    Stale,
}

/// One independently sequenced request context.
#[derive(Debug)]
pub struct LaneState<T> {
    seq: u64,
    current: Option<T>,
    error: Option<String>,
    pending: bool,
}

impl<T> Default for LaneState<T> {
    fn default() -> Self {
        Self { seq: 0, current: None, error: None, pending: false }
    }
}

impl<T: Clone> LaneState<T> {
    /// Start a new request. The settled value stays visible until the new request settles; callers
    /// whose inputs changed invalidate first.
    pub fn issue(&mut self) -> u64 {
        self.seq += 1;
        self.error = None;
        self.pending = true;
        self.seq
    }

    /// Drop the lane's value and orphan anything in flight.
    pub fn invalidate(&mut self) {
        self.seq += 1;
        self.current = None;
        self.error = None;
        self.pending = false;
    }

    pub fn settle(&mut self, seq: u64, outcome: anyhow::Result<T>, last_good: &mut Option<T>) -> Settlement {
        if seq != self.seq {
            return Settlement::Stale;
        }
        self.pending = false;
        match outcome {
            Ok(value) => {
                *last_good = Some(value.clone());
                self.current = Some(value);
                self.error = None;
                Settlement::Applied
            }
            Err(e) => {
                self.current = None;
                self.error = Some(format!("{e:#}"));
                Settlement::Failed
            }
        }
    }

    pub fn seq(&self) -> u64 { self.seq }
    pub fn current(&self) -> Option<&T> { self.current.as_ref() }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn is_pending(&self) -> bool { self.pending }
}

/// Which value the consumer should show, in priority order.
#[derive(Debug, PartialEq)]
pub enum Resolved<'a, T> {
    Scoped(&'a T),
    Global(&'a T),
    LastGood(&'a T),
    Nothing,
}

impl<'a, T> Resolved<'a, T> {
    pub fn value(&self) -> Option<&'a T> {
        match *self {
            Resolved::Scoped(v) | Resolved::Global(v) | Resolved::LastGood(v) => Some(v),
            Resolved::Nothing => None,
        }
    }
}

/// User-facing status line for a set of lanes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaneNotice {
    Idle,
    Pending { operation: &'static str },
    // Failed, but an earlier good result is still on screen
    SoftFailure { operation: &'static str, message: String },
    HardFailure { operation: &'static str, message: String },
}

impl LaneNotice {
    pub fn from_failure(operation: &'static str, message: &str, has_fallback: bool) -> Self {
        if has_fallback {
            LaneNotice::SoftFailure { operation, message: message.to_string() }
        } else {
            LaneNotice::HardFailure { operation, message: message.to_string() }
        }
    }

    pub fn is_error(&self) -> bool { matches!(self, LaneNotice::HardFailure { .. }) }
}

impl fmt::Display for LaneNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneNotice::Idle => Ok(()),
            LaneNotice::Pending { operation } => write!(f, "{} in progress", operation),
            LaneNotice::SoftFailure { operation, message } => {
                write!(f, "{} failed, showing last good result ({})", operation, message)
            }
            LaneNotice::HardFailure { operation, message } => write!(f, "{} failed, no result: {}", operation, message),
        }
    }
}

/// Global and scoped classification lanes plus the shared last-good fallback.
#[derive(Debug)]
pub struct LaneCoordinator<T> {
    global: LaneState<T>,
    scoped: LaneState<T>,
    last_good: Option<T>,
}

impl<T> Default for LaneCoordinator<T> {
    fn default() -> Self {
        Self { global: LaneState::default(), scoped: LaneState::default(), last_good: None }
    }
}

impl<T: Clone> LaneCoordinator<T> {
    pub fn new() -> Self {
        LaneCoordinator::default()
    }

    pub fn issue(&mut self, lane: Lane) -> RequestToken {
        let seq = self.lane_mut(lane).issue();
        RequestToken { lane, seq }
    }

    pub fn settle(&mut self, token: RequestToken, outcome: anyhow::Result<T>) -> Settlement {
        let (lane, last_good) = match token.lane {
            Lane::Global => (&mut self.global, &mut self.last_good),
            Lane::Scoped => (&mut self.scoped, &mut self.last_good),
        };
        let settlement = lane.settle(token.seq, outcome, last_good);
        match settlement {
            Settlement::Stale => log::debug!("discarded stale {} result seq={} current={}", token.lane, token.seq, lane.seq()),
            Settlement::Failed => log::warn!("{} failed: {}", token.lane.operation(), lane.error().unwrap_or_default()),
            Settlement::Applied => {}
        }
        settlement
    }

    pub fn invalidate(&mut self, lane: Lane) {
        self.lane_mut(lane).invalidate();
    }

    // New file: nothing from the previous one may survive, including the fallback
    pub fn reset(&mut self) {
        self.global.invalidate();
        self.scoped.invalidate();
        self.last_good = None;
    }

    pub fn lane(&self, lane: Lane) -> &LaneState<T> {
        match lane {
            Lane::Global => &self.global,
            Lane::Scoped => &self.scoped,
        }
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut LaneState<T> {
        match lane {
            Lane::Global => &mut self.global,
            Lane::Scoped => &mut self.scoped,
        }
    }

    pub fn last_good(&self) -> Option<&T> { self.last_good.as_ref() }

    pub fn resolve(&self) -> Resolved<'_, T> {
        if let Some(v) = self.scoped.current() {
            Resolved::Scoped(v)
        } else if let Some(v) = self.global.current() {
            Resolved::Global(v)
        } else if let Some(v) = self.last_good.as_ref() {
            Resolved::LastGood(v)
        } else {
            Resolved::Nothing
        }
    }

    pub fn notice(&self) -> LaneNotice {
        for lane in [Lane::Scoped, Lane::Global] {
            if let Some(message) = self.lane(lane).error() {
                return LaneNotice::from_failure(lane.operation(), message, self.last_good.is_some());
            }
        }
        for lane in [Lane::Scoped, Lane::Global] {
            if self.lane(lane).is_pending() {
                return LaneNotice::Pending { operation: lane.operation() };
            }
        }
        LaneNotice::Idle
    }
}
