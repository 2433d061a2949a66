// Edge detection for discrete operator inputs
//
// A button counts as one event on its released -> pressed transition. The
// detector only re-arms after it has seen the button released again, so a
// long press never fires twice.

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    pressed: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this cycle's level; true on a rising edge
    pub fn rising(&mut self, level: bool) -> bool {
        let edge = level && !self.pressed;
        self.pressed = level;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event_per_press() {
        let mut edge = EdgeDetector::new();
        let levels = [false, true, true, true, false, true, false];
        let events: Vec<bool> = levels.iter().map(|&l| edge.rising(l)).collect();
        assert_eq!(events, [false, true, false, false, false, true, false]);
    }

    #[test]
    fn test_press_held_from_first_sample_fires_once() {
        let mut edge = EdgeDetector::new();
        assert!(edge.rising(true));
        assert!((0..20).all(|_| !edge.rising(true)));
        assert!(!edge.rising(false));
        assert!(edge.rising(true));
    }
}
