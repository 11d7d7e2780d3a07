use std::cmp::Ordering;

use super::{Category, LogType};

/// Label of the group collecting log types without a resolvable category.
pub const NO_CATEGORY: &str = "No Category";

/// Returns either only active or only archived log types, sorted by name.
pub fn sorted_log_types(log_types: &[LogType], show_archived: bool) -> Vec<&LogType> {
    let mut result = log_types
        .iter()
        .filter(|v| v.archived == show_archived)
        .collect::<Vec<_>>();
    result.sort_by(|a, b| a.name.cmp(&b.name));
    result
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup<'a> {
    pub category_name: String,
    pub items: Vec<&'a LogType>,
}

/// Groups `log_types` by category for display.
///
/// References to categories that don't exist end up in [NO_CATEGORY], which always comes last.
/// With `use_order` items inside a group follow their ordering key, items without one go after
/// every ordered item.
pub fn group_by_category<'a>(
    log_types: &[&'a LogType],
    categories: &[Category],
    use_order: bool,
) -> Vec<CategoryGroup<'a>> {
    let mut groups: Vec<CategoryGroup<'a>> = vec![];

    for &log_type in log_types {
        let category_name = log_type
            .category
            .as_deref()
            .filter(|name| categories.iter().any(|c| c.name == *name))
            .unwrap_or(NO_CATEGORY);

        match groups.iter_mut().find(|g| g.category_name == category_name) {
            Some(group) => group.items.push(log_type),
            None => groups.push(CategoryGroup {
                category_name: category_name.to_string(),
                items: vec![log_type],
            }),
        }
    }

    for group in &mut groups {
        group.items.sort_by(|a, b| compare_items(a, b, use_order));
    }
    groups.sort_by(|a, b| compare_groups(&a.category_name, &b.category_name));
    groups
}

fn compare_groups(a: &str, b: &str) -> Ordering {
    match (a == NO_CATEGORY, b == NO_CATEGORY) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

fn compare_items(a: &LogType, b: &LogType, use_order: bool) -> Ordering {
    let by_order = if use_order {
        match (a.order, b.order) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    } else {
        Ordering::Equal
    };
    by_order.then_with(|| a.name.cmp(&b.name))
}

/// Finds the log type `offset` positions away from `current` in `sorted`.
pub fn neighbour<'a>(sorted: &[&'a LogType], current: &str, offset: isize) -> Option<&'a LogType> {
    let index = sorted.iter().position(|v| v.name == current)?;
    let target = index.checked_add_signed(offset)?;
    sorted.get(target).copied()
}
