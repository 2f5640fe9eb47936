//! Issue Store and Filter Engine
//!
//! The store owns the full issue list and the active filter criteria. The
//! filtered view is a derived list of indices into the store:
//!
//! - an issue is visible iff the toggle for its level is on AND its rule is
//!   enabled
//! - levels other than error/warning have no toggle and are never visible
//! - the view is recomputed from scratch on every change, never patched
//!
//! Key invariant: `enabled_rules` only ever holds rules present in the most
//! recently loaded list.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::issue::{parse_issue_list, Issue, Level};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub show_errors: bool,
    pub show_warnings: bool,
    pub enabled_rules: BTreeSet<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            show_errors: true,
            show_warnings: true,
            enabled_rules: BTreeSet::new(),
        }
    }
}

impl FilterState {
    pub fn level_visible(&self, level: &Level) -> bool {
        match level {
            Level::Error => self.show_errors,
            Level::Warning => self.show_warnings,
            Level::Other(_) => false,
        }
    }

    pub fn accepts(&self, issue: &Issue) -> bool {
        self.level_visible(&issue.level) && self.enabled_rules.contains(&issue.rule)
    }
}

/// Indices (into the issue list) of every issue accepted by `state`, in list order.
pub fn filtered_view(issues: &[Issue], state: &FilterState) -> Vec<usize> {
    issues
        .iter()
        .enumerate()
        .filter(|(_, issue)| state.accepts(issue))
        .map(|(i, _)| i)
        .collect()
}

/// Distinct rule names across `issues`.
pub fn rule_universe(issues: &[Issue]) -> BTreeSet<String> {
    issues.iter().map(|i| i.rule.clone()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub errors: usize,
    pub warnings: usize,
    pub other: usize,
    pub total: usize,
}

impl IssueCounts {
    pub fn of(issues: &[Issue]) -> Self {
        let mut counts = IssueCounts::default();
        for issue in issues {
            match issue.level {
                Level::Error => counts.errors += 1,
                Level::Warning => counts.warnings += 1,
                Level::Other(_) => counts.other += 1,
            }
        }
        counts.total = issues.len();
        counts
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueStore {
    issues: Vec<Issue>,
    /// Rules of the current list (checkbox universe).
    rules: BTreeSet<String>,
    state: FilterState,
    view: Vec<usize>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the issue list.
    ///
    /// If no rule is currently enabled (first load, or the reviewer cleared
    /// every rule) all rules of the new list become enabled. Otherwise prior
    /// choices are kept for rules that still exist, stale rules are dropped
    /// and rules unseen in the previous list start enabled.
    pub fn load_issues(&mut self, issues: Vec<Issue>) {
        let universe = rule_universe(&issues);

        if self.state.enabled_rules.is_empty() {
            self.state.enabled_rules = universe.clone();
        } else {
            let previous = std::mem::take(&mut self.rules);
            self.state.enabled_rules = universe
                .iter()
                .filter(|r| !previous.contains(*r) || self.state.enabled_rules.contains(*r))
                .cloned()
                .collect();
        }

        self.rules = universe;
        self.issues = issues;
        self.recompute();
    }

    /// Replace the issue list from raw JSON. Non-arrays load as empty;
    /// undecodable entries are skipped and logged.
    pub fn load_json(&mut self, value: &Value) {
        let (issues, skipped) = parse_issue_list(value);
        for (index, reason) in &skipped {
            log::warn!("skipping issue entry {}: {}", index, reason);
        }
        self.load_issues(issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn issue(&self, index: usize) -> Option<&Issue> {
        self.issues.get(index)
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn rules(&self) -> &BTreeSet<String> {
        &self.rules
    }

    /// `(rule, enabled)` for every rule of the current list, sorted by rule.
    pub fn rule_checkboxes(&self) -> Vec<(String, bool)> {
        self.rules
            .iter()
            .map(|r| (r.clone(), self.state.enabled_rules.contains(r)))
            .collect()
    }

    /// Current filtered view (indices into [`issues`](Self::issues)).
    pub fn view(&self) -> &[usize] {
        &self.view
    }

    /// Issues of the filtered view, in view order.
    pub fn visible(&self) -> impl Iterator<Item = &Issue> + '_ {
        self.view.iter().filter_map(move |&i| self.issues.get(i))
    }

    pub fn counts(&self) -> IssueCounts {
        IssueCounts::of(&self.issues)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.level.is_warning())
    }

    pub fn set_show_errors(&mut self, on: bool) {
        self.state.show_errors = on;
        self.recompute();
    }

    pub fn set_show_warnings(&mut self, on: bool) {
        self.state.show_warnings = on;
        self.recompute();
    }

    /// Enable or disable one rule. Unknown rules are ignored so the enabled
    /// set never grows beyond the current universe.
    pub fn set_rule_enabled(&mut self, rule: &str, on: bool) {
        if !self.rules.contains(rule) {
            return;
        }
        if on {
            self.state.enabled_rules.insert(rule.to_string());
        } else {
            self.state.enabled_rules.remove(rule);
        }
        self.recompute();
    }

    pub fn set_all_rules(&mut self, on: bool) {
        self.state.enabled_rules = if on { self.rules.clone() } else { BTreeSet::new() };
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = filtered_view(&self.issues, &self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn issue(rule: &str, level: Level) -> Issue {
        Issue::new(rule, level, 2, "Price", "")
    }

    #[test]
    fn first_load_enables_all_rules() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Error), issue("R2", Level::Warning)]);
        assert_eq!(store.rule_checkboxes(), vec![("R1".into(), true), ("R2".into(), true)]);
        assert_eq!(store.view(), &[0, 1]);
    }

    #[test]
    fn severity_toggles() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Error), issue("R1", Level::Warning)]);
        store.set_show_errors(false);
        assert_eq!(store.view(), &[1]);
        store.set_show_warnings(false);
        assert!(store.view().is_empty());
        store.set_show_errors(true);
        assert_eq!(store.view(), &[0]);
    }

    #[test]
    fn other_levels_never_visible() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Other("info".into()))]);
        assert!(store.view().is_empty());
        assert_eq!(store.counts().other, 1);
    }

    #[test]
    fn reload_preserves_choices() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Error), issue("R2", Level::Error)]);
        store.set_rule_enabled("R2", false);

        store.load_issues(vec![
            issue("R1", Level::Error),
            issue("R2", Level::Error),
            issue("R3", Level::Error),
        ]);
        assert_eq!(
            store.rule_checkboxes(),
            vec![("R1".into(), true), ("R2".into(), false), ("R3".into(), true)]
        );
        assert_eq!(store.view(), &[0, 2]);
    }

    #[test]
    fn reload_prunes_stale_rules() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Error), issue("R2", Level::Error)]);
        store.load_issues(vec![issue("R2", Level::Error)]);
        assert!(!store.state().enabled_rules.contains("R1"));
        assert_eq!(store.state().enabled_rules.len(), 1);
    }

    #[test]
    fn cleared_rules_reinitialize_on_load() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Error)]);
        store.set_all_rules(false);
        assert!(store.view().is_empty());
        store.load_issues(vec![issue("R1", Level::Error), issue("R2", Level::Error)]);
        assert_eq!(store.view(), &[0, 1]);
    }

    #[test]
    fn unknown_rule_toggle_ignored() {
        let mut store = IssueStore::new();
        store.load_issues(vec![issue("R1", Level::Error)]);
        store.set_rule_enabled("Nope", true);
        assert!(!store.state().enabled_rules.contains("Nope"));
    }

    #[test]
    fn load_json_non_array_is_empty() {
        let mut store = IssueStore::new();
        store.load_json(&serde_json::json!({"not": "a list"}));
        assert!(store.issues().is_empty());
        assert!(store.view().is_empty());
    }

    fn arb_issue() -> impl Strategy<Value = Issue> {
        (
            prop::sample::select(vec!["R1", "R2", "R3"]),
            prop::sample::select(vec!["error", "warning", "info"]),
            2usize..6,
        )
            .prop_map(|(rule, level, row)| Issue::new(rule, Level::parse(level), row, "A", ""))
    }

    proptest! {
        #[test]
        fn view_is_exactly_accepted_issues(
            issues in prop::collection::vec(arb_issue(), 0..30),
            show_errors in any::<bool>(),
            show_warnings in any::<bool>(),
            enabled in prop::collection::btree_set(prop::sample::select(vec!["R1", "R2", "R3"]), 0..4),
        ) {
            let state = FilterState {
                show_errors,
                show_warnings,
                enabled_rules: enabled.into_iter().map(String::from).collect(),
            };
            let view = filtered_view(&issues, &state);
            for (i, issue) in issues.iter().enumerate() {
                let expected = state.enabled_rules.contains(&issue.rule)
                    && ((issue.level.is_error() && show_errors)
                        || (issue.level.is_warning() && show_warnings));
                prop_assert_eq!(view.contains(&i), expected);
            }
            prop_assert!(view.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn reload_keeps_choices_for_surviving_rules(
            first in prop::collection::vec(arb_issue(), 1..20),
            second in prop::collection::vec(arb_issue(), 1..20),
            disable in prop::sample::select(vec!["R1", "R2", "R3"]),
        ) {
            let mut store = IssueStore::new();
            store.load_issues(first);
            store.set_rule_enabled(disable, false);
            let before = store.state().enabled_rules.clone();
            let prior_universe = store.rules().clone();
            prop_assume!(!before.is_empty());

            store.load_issues(second);
            for rule in store.rules().clone() {
                if prior_universe.contains(&rule) {
                    prop_assert_eq!(
                        store.state().enabled_rules.contains(&rule),
                        before.contains(&rule)
                    );
                }
            }
            prop_assert!(store.state().enabled_rules.is_subset(store.rules()));
        }
    }
}
