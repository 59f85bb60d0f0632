//! Step order and progress weights per topology.

use crate::model::{Step, Topology};

const STANDARD: &[(Step, u8)] = &[(Step::Outline, 10), (Step::Sections, 80), (Step::Integrate, 10)];

const STANDARD_WITH_MEDIA: &[(Step, u8)] = &[
    (Step::Outline, 10),
    (Step::Sections, 80),
    (Step::Integrate, 5),
    (Step::Media, 5),
];

const COMPARISON: &[(Step, u8)] = &[
    (Step::Outline, 10),
    (Step::Research, 10),
    (Step::Sections, 65),
    (Step::Table, 5),
    (Step::Integrate, 10),
];

const COMPARISON_WITH_MEDIA: &[(Step, u8)] = &[
    (Step::Outline, 10),
    (Step::Research, 10),
    (Step::Sections, 65),
    (Step::Table, 5),
    (Step::Integrate, 5),
    (Step::Media, 5),
];

/// The ordered work steps of one job and their share of the progress bar.
/// `Init` and `Done` carry no weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    topology: Topology,
    media: bool,
}

impl StepPlan {
    pub fn new(topology: Topology, media: bool) -> Self {
        Self { topology, media }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    fn weights(&self) -> &'static [(Step, u8)] {
        match (self.topology, self.media) {
            (Topology::Standard, false) => STANDARD,
            (Topology::Standard, true) => STANDARD_WITH_MEDIA,
            (Topology::Comparison, false) => COMPARISON,
            (Topology::Comparison, true) => COMPARISON_WITH_MEDIA,
        }
    }

    pub fn steps(&self) -> Vec<Step> {
        self.weights().iter().map(|(step, _)| *step).collect()
    }

    pub fn contains(&self, step: Step) -> bool {
        self.weights().iter().any(|(s, _)| *s == step)
    }

    /// The step that follows `step`. Steps outside this plan lead to `Done`.
    pub fn next_after(&self, step: Step) -> Step {
        let weights = self.weights();
        if step == Step::Init {
            return weights[0].0;
        }
        weights
            .iter()
            .position(|(s, _)| *s == step)
            .and_then(|i| weights.get(i + 1))
            .map(|(s, _)| *s)
            .unwrap_or(Step::Done)
    }

    pub fn weight(&self, step: Step) -> u8 {
        self.weights()
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }

    /// Sum of the weights of every step before `step`.
    fn completed_before(&self, step: Step) -> u32 {
        if step == Step::Done {
            return 100;
        }
        self.weights()
            .iter()
            .take_while(|(s, _)| *s != step)
            .map(|(_, w)| u32::from(*w))
            .sum()
    }

    /// Progress for a job standing at `step` with `cursor` of `total` sections done.
    pub fn progress_at(&self, step: Step, cursor: u32, total: u32) -> u8 {
        let progress = match step {
            Step::Init => 0,
            Step::Done => 100,
            Step::Sections if total > 0 => {
                let base = self.completed_before(Step::Sections);
                let share = u32::from(self.weight(Step::Sections)) * cursor.min(total) / total;
                base + share
            }
            _ if !self.contains(step) => 0,
            _ => self.completed_before(step),
        };
        progress.min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_hundred() {
        for topology in [Topology::Standard, Topology::Comparison] {
            for media in [false, true] {
                let plan = StepPlan::new(topology, media);
                let total: u32 = plan.steps().iter().map(|s| u32::from(plan.weight(*s))).sum();
                assert_eq!(total, 100, "{:?} media={}", topology, media);
            }
        }
    }

    #[test]
    fn test_standard_order() {
        let plan = StepPlan::new(Topology::Standard, false);
        assert_eq!(plan.next_after(Step::Init), Step::Outline);
        assert_eq!(plan.next_after(Step::Outline), Step::Sections);
        assert_eq!(plan.next_after(Step::Sections), Step::Integrate);
        assert_eq!(plan.next_after(Step::Integrate), Step::Done);
        assert!(!plan.contains(Step::Research));
    }

    #[test]
    fn test_comparison_order_with_media() {
        let plan = StepPlan::new(Topology::Comparison, true);
        assert_eq!(
            plan.steps(),
            vec![
                Step::Outline,
                Step::Research,
                Step::Sections,
                Step::Table,
                Step::Integrate,
                Step::Media
            ]
        );
        assert_eq!(plan.next_after(Step::Integrate), Step::Media);
        assert_eq!(plan.next_after(Step::Media), Step::Done);
    }

    #[test]
    fn test_media_step_outside_plan_finishes() {
        let plan = StepPlan::new(Topology::Standard, false);
        assert_eq!(plan.next_after(Step::Media), Step::Done);
    }

    #[test]
    fn test_section_progress() {
        let plan = StepPlan::new(Topology::Standard, false);
        assert_eq!(plan.progress_at(Step::Init, 0, 0), 0);
        assert_eq!(plan.progress_at(Step::Sections, 0, 5), 10);
        assert_eq!(plan.progress_at(Step::Sections, 3, 5), 58);
        assert_eq!(plan.progress_at(Step::Integrate, 5, 5), 90);
        assert_eq!(plan.progress_at(Step::Done, 5, 5), 100);
    }

    #[test]
    fn test_comparison_progress() {
        let plan = StepPlan::new(Topology::Comparison, true);
        assert_eq!(plan.progress_at(Step::Research, 0, 0), 10);
        assert_eq!(plan.progress_at(Step::Sections, 0, 4), 20);
        assert_eq!(plan.progress_at(Step::Table, 4, 4), 85);
        assert_eq!(plan.progress_at(Step::Integrate, 4, 4), 90);
        assert_eq!(plan.progress_at(Step::Media, 4, 4), 95);
    }

    #[test]
    fn test_progress_is_monotonic_over_a_run() {
        let plan = StepPlan::new(Topology::Comparison, false);
        let total = 7;
        let mut last = 0;
        for step in plan.steps() {
            let cursors = if step == Step::Sections { 0..=total } else { 0..=0 };
            for cursor in cursors {
                let p = plan.progress_at(step, cursor, total);
                assert!(p >= last);
                last = p;
            }
        }
        assert!(plan.progress_at(Step::Done, total, total) >= last);
    }
}
