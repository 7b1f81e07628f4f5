//! Ordered rule tables evaluated against an [`Analysis`].
//!
//! A table is a slice of rules in priority order. Callers either take the
//! first rule that fires or every rule that fires.

use crate::analysis::Analysis;

pub struct Rule<T> {
    pub name: &'static str,
    pub when: fn(&Analysis) -> bool,
    pub then: T,
}

impl<T> Rule<T> {
    pub const fn new(name: &'static str, when: fn(&Analysis) -> bool, then: T) -> Self {
        Self { name, when, then }
    }

    pub fn fires(&self, analysis: &Analysis) -> bool {
        (self.when)(analysis)
    }
}

pub fn first_match<'a, T>(rules: &'a [Rule<T>], analysis: &Analysis) -> Option<&'a Rule<T>> {
    rules.iter().find(|rule| rule.fires(analysis))
}

pub fn all_matches<'a, T>(
    rules: &'a [Rule<T>],
    analysis: &'a Analysis,
) -> impl Iterator<Item = &'a Rule<T>> + 'a {
    rules.iter().filter(move |rule| rule.fires(analysis))
}
