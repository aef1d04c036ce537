/// Hysteresis for partial results: a keyword is only promoted once the same
/// candidate has been seen `threshold` times in a row.
#[derive(Debug, Clone)]
pub struct PartialGate {
    threshold: u32,
    candidate: Option<String>,
    count: u32,
}

impl PartialGate {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            candidate: None,
            count: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold.max(1);
        self.reset();
    }

    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.candidate = None;
        self.count = 0;
    }

    /// Record one partial observation. Returns the keyword to emit when the
    /// candidate reaches the threshold; the gate is cleared afterwards.
    pub fn observe(&mut self, candidate: Option<&str>) -> Option<String> {
        let Some(candidate) = candidate else {
            self.reset();
            return None;
        };

        match self.candidate.as_deref() {
            Some(current) if current == candidate => self.count += 1,
            _ => {
                self.candidate = Some(candidate.to_string());
                self.count = 1;
            }
        }

        if self.count < self.threshold {
            return None;
        }
        self.count = 0;
        self.candidate.take()
    }
}

impl Default for PartialGate {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_on_threshold() {
        let mut gate = PartialGate::new(3);
        assert_eq!(gate.observe(Some("lights on")), None);
        assert_eq!(gate.observe(Some("lights on")), None);
        assert_eq!(gate.observe(Some("lights on")), Some("lights on".to_string()));
        assert_eq!(gate.candidate(), None);
        assert_eq!(gate.count(), 0);
    }

    #[test]
    fn test_emits_once_then_restarts_count() {
        let mut gate = PartialGate::new(2);
        gate.observe(Some("yes"));
        assert!(gate.observe(Some("yes")).is_some());
        assert_eq!(gate.observe(Some("yes")), None);
        assert_eq!(gate.count(), 1);
    }

    #[test]
    fn test_different_candidate_restarts_at_one() {
        let mut gate = PartialGate::new(3);
        gate.observe(Some("yes"));
        gate.observe(Some("yes"));
        assert_eq!(gate.observe(Some("no")), None);
        assert_eq!(gate.candidate(), Some("no"));
        assert_eq!(gate.count(), 1);
    }

    #[test]
    fn test_missing_candidate_resets() {
        let mut gate = PartialGate::new(2);
        gate.observe(Some("yes"));
        assert_eq!(gate.observe(None), None);
        assert_eq!(gate.count(), 0);
        assert_eq!(gate.observe(Some("yes")), None);
    }

    #[test]
    fn test_threshold_one_emits_immediately() {
        let mut gate = PartialGate::new(1);
        assert_eq!(gate.observe(Some("go")), Some("go".to_string()));
    }

    #[test]
    fn test_threshold_zero_treated_as_one() {
        let mut gate = PartialGate::new(0);
        assert_eq!(gate.threshold(), 1);
        assert!(gate.observe(Some("go")).is_some());
    }

    #[test]
    fn test_set_threshold_clears_candidate() {
        let mut gate = PartialGate::new(3);
        gate.observe(Some("go"));
        gate.set_threshold(2);
        assert_eq!(gate.candidate(), None);
    }
}
