/// Interval between redundant autosave writes.
pub const AUTOSAVE_INTERVAL_MS: u32 = 30_000;
/// How long the transient "auto-saved" status stays visible.
pub const STATUS_TTL_MS: u32 = 2_000;

/// Decides when the periodic autosave should write.
///
/// The write-through save on every keystroke is the primary path; the
/// interval save is redundant and only fires when an edit happened within
/// the last interval. Time comes in from the caller (`Date::now()` in the
/// browser, plain numbers in tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct AutosaveScheduler {
    last_edit: Option<f64>,
}

impl AutosaveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_edit(&mut self, now_ms: f64) {
        self.last_edit = Some(now_ms);
    }

    /// True when the interval tick at `now_ms` should persist.
    pub fn should_save(&self, now_ms: f64) -> bool {
        self.last_edit
            .is_some_and(|edited| now_ms - edited <= AUTOSAVE_INTERVAL_MS as f64)
    }
}

/// Transient save indicator; the view clears it once `expired` turns true.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaveStatus {
    pub message: &'static str,
    shown_at: f64,
}

impl SaveStatus {
    pub fn saved(now_ms: f64) -> Self {
        Self {
            message: "auto-saved",
            shown_at: now_ms,
        }
    }

    pub fn expired(&self, now_ms: f64) -> bool {
        now_ms - self.shown_at >= STATUS_TTL_MS as f64
    }
}
