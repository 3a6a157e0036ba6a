// src/services/workflow.rs
//
// Motor de workflow de status. Trabalha sobre o grafo já carregado de um grupo
// (status + transições) e sobre qualquer entidade que implemente `HasStatus`.
// Não grava nada: quem persiste o novo status é o módulo dono da entidade.

use serde_json::Value;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::status::{AutoAction, Status, StatusGroup, StatusTransition};
use crate::services::permission::Grants;

/// Qualquer entidade ligada a um grupo de status (recebimento, requisição, pedido...).
pub trait HasStatus {
    fn status_group_code(&self) -> &str;
    fn current_status_code(&self) -> &str;
}

/// Referência a uma entidade de outro módulo, recebida pela API de workflow.
#[derive(Debug, Clone)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub group_code: String,
    pub current_status_code: String,
}

impl HasStatus for EntityRef {
    fn status_group_code(&self) -> &str {
        &self.group_code
    }

    fn current_status_code(&self) -> &str {
        &self.current_status_code
    }
}

/// Grafo de um grupo: apenas status e transições vivos (o repositório já filtra `deleted_at`).
#[derive(Debug, Clone)]
pub struct Workflow {
    pub group: StatusGroup,
    pub statuses: Vec<Status>,
    pub transitions: Vec<StatusTransition>,
}

/// Resultado de uma avaliação bem-sucedida.
#[derive(Debug, Clone)]
pub struct TransitionDecision<'w> {
    pub from: &'w Status,
    pub to: &'w Status,
    pub transition: &'w StatusTransition,
    pub auto_actions: Vec<AutoAction>,
}

impl Workflow {
    pub fn status(&self, code: &str) -> Result<&Status, AppError> {
        self.statuses
            .iter()
            .find(|s| s.code == code)
            .ok_or_else(|| AppError::not_found("Status", format!("{}/{}", self.group.code, code)))
    }

    /// Transição `from -> to`: linha com `to_status_id = to` e `from_status_id = from` ou NULL.
    /// A linha específica tem precedência sobre a genérica.
    pub fn find_transition(&self, from: &Status, to: &Status) -> Option<&StatusTransition> {
        let candidates = self
            .transitions
            .iter()
            .filter(|t| t.is_active && t.to_status_id == to.id);

        let mut generic = None;
        for t in candidates {
            match t.from_status_id {
                Some(id) if id == from.id => return Some(t),
                None if generic.is_none() => generic = Some(t),
                _ => {}
            }
        }
        generic
    }

    /// Transições que partem de `code` (específicas ou "de qualquer status"), por `display_order`.
    pub fn available_from(&self, code: &str) -> Result<Vec<&StatusTransition>, AppError> {
        let from = self.status(code)?;
        let mut out: Vec<&StatusTransition> = self
            .transitions
            .iter()
            .filter(|t| t.is_active && t.from_status_id.is_none_or(|id| id == from.id))
            .collect();
        out.sort_by_key(|t| t.display_order);
        Ok(out)
    }

    /// Valida a mudança de status da entidade. A ordem das verificações importa:
    /// existência dos status, aresta, motivo, permissão exigida e, por último, cargos.
    pub fn evaluate<'w, E: HasStatus + ?Sized>(
        &'w self,
        entity: &E,
        target_status_code: &str,
        reason: Option<&str>,
        grants: &Grants,
    ) -> Result<TransitionDecision<'w>, AppError> {
        // Status de outro grupo não existe neste grafo
        if entity.status_group_code() != self.group.code {
            return Err(AppError::not_found(
                "Status",
                format!("{}/{}", entity.status_group_code(), entity.current_status_code()),
            ));
        }

        let from = self.status(entity.current_status_code())?;
        let to = self.status(target_status_code)?;

        let transition = self.find_transition(from, to).ok_or_else(|| AppError::IllegalTransition {
            from: from.code.clone(),
            to: to.code.clone(),
        })?;

        if transition.requires_reason && reason.is_none_or(|r| r.trim().is_empty()) {
            return Err(AppError::ReasonRequired(transition.transition_name.clone()));
        }

        if let Some(required) = transition.required_permission.as_deref().filter(|p| !p.is_empty()) {
            let missing = grants.permissions.missing(&[required]);
            if !missing.is_empty() {
                return Err(AppError::PermissionDenied(missing));
            }
        }

        if !transition.allowed_roles.is_empty() && !grants.has_any_role(&transition.allowed_roles) {
            return Err(AppError::RoleNotAllowed(transition.allowed_roles.clone()));
        }

        Ok(TransitionDecision {
            from,
            to,
            transition,
            auto_actions: auto_actions(transition.auto_actions.as_ref()),
        })
    }
}

/// Descritores das ações automáticas. Aceita objeto (`{"updateStock": true}`)
/// ou lista de nomes (`["sendNotification"]`); entradas `false`/`null` são desligadas.
pub fn auto_actions(descriptor: Option<&Value>) -> Vec<AutoAction> {
    match descriptor {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Null | Value::Bool(false)))
            .map(|(k, v)| AutoAction { action: k.clone(), params: v.clone() })
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|name| AutoAction { action: name.to_string(), params: Value::Bool(true) })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::status::StatusType;
    use crate::services::permission::PermissionSet;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashSet;

    pub(crate) fn status(group: &StatusGroup, code: &str, status_type: StatusType, order: i32) -> Status {
        let now = Utc::now();
        Status {
            id: Uuid::new_v4(),
            status_group_id: group.id,
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            status_type,
            display_order: order,
            color: None,
            icon: None,
            is_default: order == 1,
            is_editable: true,
            is_deletable: false,
            is_system_status: true,
            requires_approval: false,
            required_permission: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn transition(group: &StatusGroup, from: Option<&Status>, to: &Status, order: i32) -> StatusTransition {
        let now = Utc::now();
        StatusTransition {
            id: Uuid::new_v4(),
            status_group_id: group.id,
            from_status_id: from.map(|s| s.id),
            to_status_id: to.id,
            transition_name: format!("-> {}", to.code),
            requires_approval: false,
            requires_reason: false,
            required_permission: None,
            allowed_roles: vec![],
            validation_rules: None,
            auto_actions: None,
            display_order: order,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// INV_RECEIPTS: DRAFT -> RECEIVING -> COMPLETED, e CANCELLED a partir de qualquer status.
    pub(crate) fn receipts() -> Workflow {
        let now = Utc::now();
        let group = StatusGroup {
            id: Uuid::new_v4(),
            tenant_id: None,
            code: "INV_RECEIPTS".into(),
            name: "Receipts".into(),
            description: None,
            module: "INVENTORY".into(),
            entity_type: "RECEIPT".into(),
            allow_custom_statuses: false,
            require_workflow: true,
            is_system_group: true,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let draft = status(&group, "DRAFT", StatusType::Initial, 1);
        let receiving = status(&group, "RECEIVING", StatusType::Intermediate, 2);
        let completed = status(&group, "COMPLETED", StatusType::Final, 3);
        let cancelled = status(&group, "CANCELLED", StatusType::Cancelled, 4);

        let start = transition(&group, Some(&draft), &receiving, 1);
        let mut complete = transition(&group, Some(&receiving), &completed, 2);
        complete.required_permission = Some("INV:receipts:complete:tenant".into());
        complete.auto_actions = Some(json!({ "updateStock": true, "sendNotification": false }));
        let mut cancel = transition(&group, None, &cancelled, 3);
        cancel.requires_reason = true;
        cancel.allowed_roles = vec!["WAREHOUSE_MANAGER".into()];

        Workflow {
            group,
            statuses: vec![draft, receiving, completed, cancelled],
            transitions: vec![start, complete, cancel],
        }
    }

    fn receipt(current: &str) -> EntityRef {
        EntityRef {
            entity_type: "RECEIPT".into(),
            entity_id: Uuid::new_v4(),
            group_code: "INV_RECEIPTS".into(),
            current_status_code: current.into(),
        }
    }

    fn grants(perms: &[&str], roles: &[&str]) -> Grants {
        Grants {
            permissions: PermissionSet::from_codes(perms.iter().copied()),
            roles: roles.iter().map(|r| r.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn draft_to_receiving_is_allowed() {
        let wf = receipts();
        let decision = wf.evaluate(&receipt("DRAFT"), "RECEIVING", None, &Grants::default()).unwrap();
        assert_eq!(decision.from.code, "DRAFT");
        assert_eq!(decision.to.code, "RECEIVING");
        assert!(decision.auto_actions.is_empty());
    }

    #[test]
    fn draft_to_completed_without_edge_is_illegal() {
        let wf = receipts();
        let err = wf
            .evaluate(&receipt("DRAFT"), "COMPLETED", None, &grants(&["*:*:*:*"], &[]))
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { ref from, ref to } if from == "DRAFT" && to == "COMPLETED"));
    }

    #[test]
    fn no_implicit_self_loop() {
        let wf = receipts();
        let err = wf.evaluate(&receipt("DRAFT"), "DRAFT", None, &Grants::default()).unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));
    }

    #[test]
    fn unknown_statuses_are_not_found() {
        let wf = receipts();
        assert!(matches!(
            wf.evaluate(&receipt("ARCHIVED"), "RECEIVING", None, &Grants::default()),
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            wf.evaluate(&receipt("DRAFT"), "ARCHIVED", None, &Grants::default()),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn status_of_another_group_is_not_found() {
        let wf = receipts();
        let mut entity = receipt("DRAFT");
        entity.group_code = "INV_ISSUES".into();
        assert!(matches!(
            wf.evaluate(&entity, "RECEIVING", None, &Grants::default()),
            Err(AppError::NotFound { resource: "Status", .. })
        ));
    }

    #[test]
    fn required_permission_is_checked_and_auto_actions_reported() {
        let wf = receipts();
        let err = wf
            .evaluate(&receipt("RECEIVING"), "COMPLETED", None, &grants(&["INV:receipts:read:tenant"], &[]))
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(ref m) if m == &vec!["INV:receipts:complete:tenant".to_string()]));

        let decision = wf
            .evaluate(&receipt("RECEIVING"), "COMPLETED", None, &grants(&["INV:receipts:*:tenant"], &[]))
            .unwrap();
        assert_eq!(
            decision.auto_actions,
            vec![AutoAction { action: "updateStock".into(), params: json!(true) }]
        );
    }

    #[test]
    fn from_any_transition_checks_reason_before_roles() {
        let wf = receipts();
        let manager = grants(&[], &["WAREHOUSE_MANAGER"]);

        let err = wf.evaluate(&receipt("RECEIVING"), "CANCELLED", Some("  "), &manager).unwrap_err();
        assert!(matches!(err, AppError::ReasonRequired(_)));

        let err = wf
            .evaluate(&receipt("RECEIVING"), "CANCELLED", Some("fornecedor desistiu"), &grants(&[], &["CLERK"]))
            .unwrap_err();
        assert!(matches!(err, AppError::RoleNotAllowed(_)));

        for current in ["DRAFT", "RECEIVING", "COMPLETED"] {
            let decision = wf
                .evaluate(&receipt(current), "CANCELLED", Some("fornecedor desistiu"), &manager)
                .unwrap();
            assert_eq!(decision.to.code, "CANCELLED");
        }
    }

    #[test]
    fn specific_edge_wins_over_generic() {
        let mut wf = receipts();
        let receiving = wf.status("RECEIVING").unwrap().clone();
        let cancelled = wf.status("CANCELLED").unwrap().clone();
        let mut specific = transition(&wf.group, Some(&receiving), &cancelled, 9);
        specific.transition_name = "Abortar recebimento".into();
        wf.transitions.push(specific);

        let manager = grants(&[], &["WAREHOUSE_MANAGER"]);
        let decision = wf.evaluate(&receipt("RECEIVING"), "CANCELLED", None, &manager).unwrap();
        assert_eq!(decision.transition.transition_name, "Abortar recebimento");
    }

    #[test]
    fn inactive_transitions_are_ignored() {
        let mut wf = receipts();
        wf.transitions[0].is_active = false;
        assert!(matches!(
            wf.evaluate(&receipt("DRAFT"), "RECEIVING", None, &Grants::default()),
            Err(AppError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn available_transitions_include_generic_edges() {
        let wf = receipts();
        let names: Vec<_> = wf
            .available_from("DRAFT")
            .unwrap()
            .iter()
            .map(|t| t.transition_name.clone())
            .collect();
        assert_eq!(names, vec!["-> RECEIVING", "-> CANCELLED"]);
    }

    #[test]
    fn auto_actions_accept_lists() {
        let actions = auto_actions(Some(&json!(["sendNotification"])));
        assert_eq!(actions[0].action, "sendNotification");
        assert!(auto_actions(None).is_empty());
        assert!(auto_actions(Some(&json!("updateStock"))).is_empty());
    }
}
