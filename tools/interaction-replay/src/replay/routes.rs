//! Opaque-id routing: exact ids first, then prefixes in declaration order.

use crate::driver::{AppOperation, OperationFamily};
use crate::replay::recognizers::{
    CONNECTION_ITEM_PREFIX, EXPORT_OPTION_PREFIX, QUERY_DELETE_PREFIX,
};
use crate::types::{ReplayProfile, ReplayTimeouts};
use std::collections::BTreeMap;
use std::time::Duration;

/// Operations that consume the step itself rather than taking no arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    EnterQueryName,
    SelectExportDestination,
    ActivateConnection,
    PreviewActive,
    ExportActive,
    DeleteActive,
    SetQueryText,
    SelectExportOption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Operation(AppOperation),
    Timed(AppOperation, Duration),
    StepAction(StepAction),
    Family(OperationFamily),
}

/// What a resolved route asks the dispatcher to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Invoke(AppOperation, Option<Duration>),
    Step(StepAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The exact id or prefix that matched.
    pub route: String,
    pub action: RouteAction,
}

/// Family suffix lookup, built from what the application says it supports.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    by_suffix: BTreeMap<(OperationFamily, &'static str), AppOperation>,
}

impl OperationRegistry {
    pub fn from_supported(ops: &[AppOperation]) -> Self {
        let mut registry = Self::default();
        for op in ops {
            registry.register(*op);
        }
        registry
    }

    pub fn register(&mut self, op: AppOperation) {
        if let Some((family, suffix)) = op.family() {
            self.by_suffix.insert((family, suffix), op);
        }
    }

    pub fn lookup(&self, family: OperationFamily, suffix: &str) -> Option<AppOperation> {
        self.by_suffix
            .iter()
            .find(|((f, s), _)| *f == family && *s == suffix)
            .map(|(_, op)| *op)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    exact: BTreeMap<String, RouteTarget>,
    prefixes: Vec<(String, RouteTarget)>,
    registry: OperationRegistry,
}

impl RouteTable {
    pub fn new(registry: OperationRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn for_profile(
        profile: ReplayProfile,
        timeouts: &ReplayTimeouts,
        supported: &[AppOperation],
    ) -> Self {
        let mut table = Self::new(OperationRegistry::from_supported(supported));
        table.register_shared(timeouts);
        match profile {
            ReplayProfile::Full => {
                table.register_prefix(
                    OperationFamily::MainNavigation.prefix(),
                    RouteTarget::Family(OperationFamily::MainNavigation),
                );
                table.register_prefix(
                    OperationFamily::HomeManager.prefix(),
                    RouteTarget::Family(OperationFamily::HomeManager),
                );
            }
            ReplayProfile::Simple => table.register_simple(),
        }
        table
    }

    fn register_shared(&mut self, timeouts: &ReplayTimeouts) {
        use AppOperation::*;
        let plain = [
            ("main-sql-mode", SqlMode),
            ("main-olap-mode", OlapMode),
            ("main-file-mode", FileMode),
            ("main-smartdocs", Smartdocs),
            ("main-connection-manager", ConnectionManager),
            ("main-settings", Settings),
            ("main-about", About),
            ("sql-home-open-sql-manager", SqlManager),
            ("sql-home-open-report-manager", ReportManager),
            ("sql-home-open-query-history", QueryHistory),
            ("sql-home-open-log", Log),
            ("sql-manager-add-query-open", AddQueryOpen),
            ("sql-manager-add-query-confirm", AddQueryConfirm),
            ("sql-manager-minimize", Minimize),
            ("sql-manager-toggle-left-panel", ToggleLeftPanel),
        ];
        for (id, op) in plain {
            self.register_exact(id, RouteTarget::Operation(op));
        }
        self.register_exact(
            "sql-manager-export-confirm",
            RouteTarget::Timed(ExportConfirm, timeouts.export),
        );
        self.register_exact(
            "messagebox-button-OK-0",
            RouteTarget::Timed(SuccessAcknowledge, timeouts.success),
        );
    }

    fn register_simple(&mut self) {
        self.register_exact(
            "sql-manager-add-query-name",
            RouteTarget::StepAction(StepAction::EnterQueryName),
        );
        self.register_exact(
            "sql-manager-export-destination",
            RouteTarget::StepAction(StepAction::SelectExportDestination),
        );
        let prefixes = [
            (CONNECTION_ITEM_PREFIX, StepAction::ActivateConnection),
            ("sql-manager-query-preview-", StepAction::PreviewActive),
            ("sql-manager-query-export-", StepAction::ExportActive),
            (QUERY_DELETE_PREFIX, StepAction::DeleteActive),
            ("sql-manager-query-editor-", StepAction::SetQueryText),
            (EXPORT_OPTION_PREFIX, StepAction::SelectExportOption),
        ];
        for (prefix, action) in prefixes {
            self.register_prefix(prefix, RouteTarget::StepAction(action));
        }
    }

    pub fn register_exact(&mut self, id: &str, target: RouteTarget) {
        self.exact.insert(id.to_string(), target);
    }

    pub fn register_prefix(&mut self, prefix: &str, target: RouteTarget) {
        self.prefixes.push((prefix.to_string(), target));
    }

    pub fn resolve(&self, test_id: &str) -> Option<RouteMatch> {
        if test_id.is_empty() {
            return None;
        }
        if let Some(target) = self.exact.get(test_id) {
            if let Some(action) = self.action_for(*target, "") {
                return Some(RouteMatch {
                    route: test_id.to_string(),
                    action,
                });
            }
        }
        for (prefix, target) in &self.prefixes {
            let Some(suffix) = test_id.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if let Some(action) = self.action_for(*target, suffix) {
                return Some(RouteMatch {
                    route: prefix.clone(),
                    action,
                });
            }
        }
        None
    }

    fn action_for(&self, target: RouteTarget, suffix: &str) -> Option<RouteAction> {
        match target {
            RouteTarget::Operation(op) => Some(RouteAction::Invoke(op, None)),
            RouteTarget::Timed(op, timeout) => Some(RouteAction::Invoke(op, Some(timeout))),
            RouteTarget::StepAction(action) => Some(RouteAction::Step(action)),
            RouteTarget::Family(family) => self
                .registry
                .lookup(family, suffix)
                .map(|op| RouteAction::Invoke(op, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationRegistry, RouteAction, RouteTable, RouteTarget, StepAction};
    use crate::driver::{AppOperation, OperationFamily};
    use crate::types::{ReplayProfile, ReplayTimeouts};
    use std::time::Duration;

    fn full() -> RouteTable {
        RouteTable::for_profile(
            ReplayProfile::Full,
            &ReplayTimeouts::default(),
            &AppOperation::ALL,
        )
    }

    #[test]
    fn exact_routes_carry_configured_timeouts() {
        let table = full();
        assert_eq!(
            table.resolve("sql-manager-export-confirm").map(|m| m.action),
            Some(RouteAction::Invoke(
                AppOperation::ExportConfirm,
                Some(Duration::from_secs(60))
            ))
        );
        assert_eq!(
            table.resolve("messagebox-button-OK-0").map(|m| m.action),
            Some(RouteAction::Invoke(
                AppOperation::SuccessAcknowledge,
                Some(Duration::from_secs(30))
            ))
        );
    }

    #[test]
    fn family_prefix_finds_operations_missing_from_the_exact_table() {
        let matched = full().resolve("main-close-plugin").expect("route");
        assert_eq!(matched.route, "main-");
        assert_eq!(
            matched.action,
            RouteAction::Invoke(AppOperation::ClosePlugin, None)
        );
    }

    #[test]
    fn family_miss_falls_through_to_nothing() {
        assert_eq!(full().resolve("main-unknown-button"), None);
        assert_eq!(full().resolve("sql-home-open-"), None);
        assert_eq!(full().resolve(""), None);
    }

    #[test]
    fn unsupported_operations_are_not_registered() {
        let supported = AppOperation::ALL
            .iter()
            .copied()
            .filter(|op| *op != AppOperation::ClosePlugin)
            .collect::<Vec<_>>();
        let table =
            RouteTable::for_profile(ReplayProfile::Full, &ReplayTimeouts::default(), &supported);
        assert_eq!(table.resolve("main-close-plugin"), None);
    }

    #[test]
    fn prefixes_are_tried_in_declaration_order() {
        let mut table = RouteTable::new(OperationRegistry::from_supported(&AppOperation::ALL));
        table.register_prefix("main-", RouteTarget::Family(OperationFamily::MainNavigation));
        table.register_prefix("main-", RouteTarget::Operation(AppOperation::Minimize));
        assert_eq!(
            table.resolve("main-about").map(|m| m.action),
            Some(RouteAction::Invoke(AppOperation::About, None))
        );
        assert_eq!(
            table.resolve("main-nothing").map(|m| m.action),
            Some(RouteAction::Invoke(AppOperation::Minimize, None))
        );
    }

    #[test]
    fn exact_route_beats_a_matching_prefix() {
        let mut table = RouteTable::new(OperationRegistry::from_supported(&AppOperation::ALL));
        table.register_prefix("main-", RouteTarget::Operation(AppOperation::Minimize));
        table.register_exact("main-about", RouteTarget::Operation(AppOperation::About));
        let matched = table.resolve("main-about").expect("routed");
        assert_eq!(matched.route, "main-about");
        assert_eq!(matched.action, RouteAction::Invoke(AppOperation::About, None));
        assert_eq!(
            table.resolve("main-other").map(|m| m.action),
            Some(RouteAction::Invoke(AppOperation::Minimize, None))
        );
    }

    #[test]
    fn simple_profile_routes_step_actions_and_skips_families() {
        let table = RouteTable::for_profile(
            ReplayProfile::Simple,
            &ReplayTimeouts::default(),
            &AppOperation::ALL,
        );
        assert_eq!(
            table.resolve("sql-manager-add-query-name").map(|m| m.action),
            Some(RouteAction::Step(StepAction::EnterQueryName))
        );
        assert_eq!(
            table.resolve("sql-manager-query-preview-4").map(|m| m.action),
            Some(RouteAction::Step(StepAction::PreviewActive))
        );
        assert_eq!(table.resolve("main-close-plugin"), None);
        assert_eq!(
            table.resolve("main-about").map(|m| m.action),
            Some(RouteAction::Invoke(AppOperation::About, None))
        );
    }
}
