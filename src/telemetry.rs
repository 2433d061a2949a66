// Per-cycle caption/value telemetry
//
// Write-only side channel: nothing in the control core reads it back.

use std::fmt::Display;

use crate::messages::TelemetryFrame;

#[derive(Debug, Default)]
pub struct Telemetry {
    lines: Vec<(String, String)>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a line for the current cycle; a repeated caption replaces the earlier value
    pub fn add_data(&mut self, caption: &str, value: impl Display) {
        let value = value.to_string();
        match self.lines.iter_mut().find(|(c, _)| c == caption) {
            Some(line) => line.1 = value,
            None => self.lines.push((caption.to_string(), value)),
        }
    }

    pub fn get(&self, caption: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(c, _)| c == caption)
            .map(|(_, v)| v.as_str())
    }

    /// Hand over this cycle's lines and start a fresh frame
    pub fn take_frame(&mut self) -> TelemetryFrame {
        TelemetryFrame {
            lines: std::mem::take(&mut self.lines),
        }
    }
}

impl TelemetryFrame {
    pub fn get(&self, caption: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(c, _)| c == caption)
            .map(|(_, v)| v.as_str())
    }
}
