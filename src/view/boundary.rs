use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Scene3d,
    Flat2d,
}

impl RenderMode {
    pub fn fallback(self) -> Option<RenderMode> {
        match self {
            RenderMode::Scene3d => Some(RenderMode::Flat2d),
            RenderMode::Flat2d => None,
        }
    }
}

#[derive(Debug)]
pub enum RenderOutcome<T> {
    Rendered { mode: RenderMode, output: T },
    // `fallback` is the mode the next frame will use, if a simpler one was left
    Failed { mode: RenderMode, fallback: Option<RenderMode>, reason: String },
}

impl<T> RenderOutcome<T> {
    pub fn is_rendered(&self) -> bool { matches!(self, RenderOutcome::Rendered { .. }) }
}

/// Wraps draw calls so that an error or panic downgrades the render mode instead of taking the
/// enclosing view down.
#[derive(Debug)]
pub struct RenderBoundary {
    preferred: RenderMode,
    mode: RenderMode,
    faults: u32,
}

impl RenderBoundary {
    pub fn new(preferred: RenderMode) -> Self {
        Self { preferred, mode: preferred, faults: 0 }
    }

    pub fn mode(&self) -> RenderMode { self.mode }
    pub fn faults(&self) -> u32 { self.faults }

    pub fn render<T>(&mut self, draw: impl FnOnce(RenderMode) -> anyhow::Result<T>) -> RenderOutcome<T> {
        let mode = self.mode;
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| draw(mode))) {
            Ok(Ok(output)) => return RenderOutcome::Rendered { mode, output },
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        };
        self.faults += 1;
        let fallback = mode.fallback();
        match fallback {
            Some(next) => {
                log::info!("render fault in {:?} mode, falling back to {:?}: {}", mode, next, reason);
                self.mode = next;
            }
            None => log::warn!("render fault in {:?} mode with no simpler mode left: {}", mode, reason),
        }
        RenderOutcome::Failed { mode, fallback, reason }
    }

    // Retry the preferred mode, e.g. after the graph was replaced
    pub fn reset(&mut self) {
        self.mode = self.preferred;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
