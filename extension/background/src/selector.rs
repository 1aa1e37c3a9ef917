//! Picks the tab a command acts on.
//!
//! The policy is data: an ordered list of rules, first match wins. Callers
//! pass only tabs that belong to the site.

use ytc_protocol::TabInfo;

pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&TabInfo) -> bool,
}

fn audible(tab: &TabInfo) -> bool {
    tab.audible
}

fn watching_video(tab: &TabInfo) -> bool {
    tab.is_watching_video()
}

fn any(_: &TabInfo) -> bool {
    true
}

/// Audio first, then a watch page, then whatever the host listed first.
pub const PRIORITY: &[Rule] = &[
    Rule {
        name: "audible",
        matches: audible,
    },
    Rule {
        name: "watching_video",
        matches: watching_video,
    },
    Rule {
        name: "any",
        matches: any,
    },
];

pub fn select_target(tabs: &[TabInfo]) -> Option<&TabInfo> {
    select_with(PRIORITY, tabs).map(|(_, tab)| tab)
}

/// Returns the winning tab and the name of the rule that picked it.
pub fn select_with<'a>(rules: &[Rule], tabs: &'a [TabInfo]) -> Option<(&'static str, &'a TabInfo)> {
    rules
        .iter()
        .find_map(|rule| tabs.iter().find(|tab| (rule.matches)(tab)).map(|tab| (rule.name, tab)))
}
