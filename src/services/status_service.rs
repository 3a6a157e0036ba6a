// src/services/status_service.rs

use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::common::pagination::Paginated;
use crate::db::StatusRepository;
use crate::models::status::{
    CreateStatusGroupPayload, CreateStatusPayload, CreateTransitionPayload, Status, StatusGroup,
    StatusGroupDetail, StatusGroupQuery, StatusTransition, TransitionOutcome,
    UpdateStatusGroupPayload, UpdateStatusPayload, UpdateTransitionPayload,
};
use crate::services::permission::Grants;
use crate::services::workflow::{HasStatus, Workflow};

#[derive(Clone)]
pub struct StatusService {
    repo: StatusRepository,
}

impl StatusService {
    pub fn new(repo: StatusRepository) -> Self {
        Self { repo }
    }

    async fn group(&self, conn: &mut PgConnection, tenant_id: Uuid, code: &str) -> Result<StatusGroup, AppError> {
        self.repo
            .find_group_by_code(conn, tenant_id, code)
            .await?
            .ok_or_else(|| AppError::not_found("StatusGroup", code))
    }

    async fn status(&self, conn: &mut PgConnection, group: &StatusGroup, code: &str) -> Result<Status, AppError> {
        self.repo
            .find_status(conn, group.id, code)
            .await?
            .ok_or_else(|| AppError::not_found("Status", format!("{}/{}", group.code, code)))
    }

    // ---
    // Grupos
    // ---

    pub async fn create_group(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        payload: CreateStatusGroupPayload,
    ) -> Result<StatusGroup, AppError> {
        if self.repo.code_taken(&mut *conn, &payload.code).await? {
            return Err(AppError::already_exists("StatusGroup", &payload.code));
        }
        let group = self.repo.create_group(&mut *conn, tenant_id, &payload).await?;

        tracing::info!(group = %group.code, module = %group.module, "grupo de status criado");
        Ok(group)
    }

    pub async fn list_groups(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        query: &StatusGroupQuery,
    ) -> Result<Paginated<StatusGroup>, AppError> {
        let (data, total) = self.repo.list_groups(conn, tenant_id, query).await?;
        Ok(Paginated::new(data, total, &query.pagination()))
    }

    pub async fn get_group(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<StatusGroupDetail, AppError> {
        let group = self.group(&mut *conn, tenant_id, code).await?;
        let statuses = self.repo.list_statuses(&mut *conn, group.id).await?;
        let transitions = self.repo.list_transitions(&mut *conn, group.id).await?;
        Ok(StatusGroupDetail { group, statuses, transitions })
    }

    pub async fn update_group(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        code: &str,
        payload: UpdateStatusGroupPayload,
    ) -> Result<StatusGroup, AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, code).await?;

        if let Some(new_code) = payload.code.as_deref().filter(|c| *c != group.code) {
            if group.is_system_group {
                return Err(AppError::SystemResourceImmutable("StatusGroup"));
            }
            if self.repo.code_taken(&mut *tx, new_code).await? {
                return Err(AppError::already_exists("StatusGroup", new_code));
            }
        }

        let updated = self.repo.update_group(&mut *tx, group.id, &payload).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Só exclui grupo que não é do sistema e não tem status vivos.
    /// A contagem e a exclusão rodam na mesma transação, com o grupo travado.
    pub async fn delete_group(&self, conn: &mut PgConnection, tenant_id: Uuid, code: &str) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, code).await?;
        self.repo.lock_group(&mut *tx, group.id).await?;

        if group.is_system_group {
            return Err(AppError::SystemResourceImmutable("StatusGroup"));
        }
        if self.repo.count_live_statuses(&mut *tx, group.id).await? > 0 {
            return Err(AppError::StatusGroupHasStatuses(group.code));
        }

        self.repo.soft_delete_group(&mut *tx, group.id).await?;
        tx.commit().await?;

        tracing::info!(group = %group.code, "grupo de status removido");
        Ok(())
    }

    // ---
    // Status
    // ---

    pub async fn create_status(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        payload: CreateStatusPayload,
    ) -> Result<Status, AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, group_code).await?;

        if self.repo.find_status(&mut *tx, group.id, &payload.code).await?.is_some() {
            return Err(AppError::already_exists("Status", &payload.code));
        }

        // "Limpa o default anterior, grava o novo" na mesma transação
        if payload.is_default {
            self.repo.clear_default_status(&mut *tx, group.id, None).await?;
        }
        let status = self.repo.create_status(&mut *tx, group.id, &payload).await?;
        tx.commit().await?;

        tracing::info!(group = %group.code, status = %status.code, "status criado");
        Ok(status)
    }

    pub async fn list_statuses(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
    ) -> Result<Vec<Status>, AppError> {
        let group = self.group(&mut *conn, tenant_id, group_code).await?;
        self.repo.list_statuses(&mut *conn, group.id).await
    }

    pub async fn update_status(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        status_code: &str,
        payload: UpdateStatusPayload,
    ) -> Result<Status, AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, group_code).await?;
        let current = self.status(&mut tx, &group, status_code).await?;

        if let Some(new_code) = payload.code.as_deref().filter(|c| *c != current.code) {
            if current.is_system_status {
                return Err(AppError::SystemResourceImmutable("Status"));
            }
            if self.repo.find_status(&mut *tx, group.id, new_code).await?.is_some() {
                return Err(AppError::already_exists("Status", new_code));
            }
        }

        if payload.is_default == Some(true) && payload.is_active != Some(false) {
            self.repo.clear_default_status(&mut *tx, group.id, Some(current.id)).await?;
        }
        let status = self.repo.update_status(&mut *tx, current.id, &payload).await?;
        tx.commit().await?;
        Ok(status)
    }

    pub async fn delete_status(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        status_code: &str,
    ) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, group_code).await?;
        self.repo.lock_group(&mut *tx, group.id).await?;
        let status = self.status(&mut tx, &group, status_code).await?;

        if status.is_system_status {
            return Err(AppError::SystemResourceImmutable("Status"));
        }

        self.repo.soft_delete_status(&mut *tx, status.id).await?;
        tx.commit().await?;

        tracing::info!(group = %group.code, status = %status.code, "status removido");
        Ok(())
    }

    // ---
    // Transições
    // ---

    /// `to` e (quando houver) `from` precisam ser status vivos do próprio grupo.
    async fn check_same_group(
        &self,
        conn: &mut PgConnection,
        group: &StatusGroup,
        from: Option<Uuid>,
        to: Uuid,
    ) -> Result<(), AppError> {
        let statuses = self.repo.list_statuses(conn, group.id).await?;
        for id in from.into_iter().chain([to]) {
            if !statuses.iter().any(|s| s.id == id) {
                return Err(AppError::StatusOutsideGroup {
                    status: id.to_string(),
                    group: group.code.clone(),
                });
            }
        }
        Ok(())
    }

    pub async fn create_transition(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        payload: CreateTransitionPayload,
    ) -> Result<StatusTransition, AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, group_code).await?;
        self.check_same_group(&mut tx, &group, payload.from_status_id, payload.to_status_id)
            .await?;

        let transition = self.repo.create_transition(&mut *tx, group.id, &payload).await?;
        tx.commit().await?;

        tracing::info!(group = %group.code, transition = %transition.transition_name, "transição criada");
        Ok(transition)
    }

    pub async fn list_transitions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
    ) -> Result<Vec<StatusTransition>, AppError> {
        let group = self.group(&mut *conn, tenant_id, group_code).await?;
        self.repo.list_transitions(&mut *conn, group.id).await
    }

    pub async fn update_transition(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        id: Uuid,
        payload: UpdateTransitionPayload,
    ) -> Result<StatusTransition, AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, group_code).await?;
        let current = self
            .repo
            .find_transition(&mut *tx, group.id, id)
            .await?
            .ok_or_else(|| AppError::not_found("StatusTransition", id))?;

        let from = if payload.from_any_status {
            None
        } else {
            payload.from_status_id.or(current.from_status_id)
        };
        let to = payload.to_status_id.unwrap_or(current.to_status_id);
        self.check_same_group(&mut tx, &group, from, to).await?;

        let transition = self.repo.update_transition(&mut *tx, id, from, to, &payload).await?;
        tx.commit().await?;
        Ok(transition)
    }

    pub async fn delete_transition(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;
        let group = self.group(&mut tx, tenant_id, group_code).await?;
        self.repo
            .find_transition(&mut *tx, group.id, id)
            .await?
            .ok_or_else(|| AppError::not_found("StatusTransition", id))?;
        self.repo.delete_transition(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    // ---
    // Workflow
    // ---

    pub async fn load_workflow(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
    ) -> Result<Workflow, AppError> {
        let group = self.group(&mut *conn, tenant_id, group_code).await?;
        let statuses = self.repo.list_statuses(&mut *conn, group.id).await?;
        let transitions = self.repo.list_transitions(&mut *conn, group.id).await?;
        Ok(Workflow { group, statuses, transitions })
    }

    /// Valida a mudança de status de uma entidade e devolve o novo estado
    /// mais as ações automáticas declaradas (que não são executadas aqui).
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_transition<E: HasStatus + ?Sized>(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        entity: &E,
        entity_id: Uuid,
        target_status_code: &str,
        reason: Option<String>,
        comments: Option<String>,
        grants: &Grants,
    ) -> Result<TransitionOutcome, AppError> {
        let workflow = self.load_workflow(conn, tenant_id, entity.status_group_code()).await?;
        let decision = workflow.evaluate(entity, target_status_code, reason.as_deref(), grants)?;

        tracing::info!(
            group = %workflow.group.code,
            %entity_id,
            from = %decision.from.code,
            to = %decision.to.code,
            "transição de status aprovada"
        );

        Ok(TransitionOutcome {
            entity_id,
            previous_status: decision.from.clone(),
            new_status: decision.to.clone(),
            transition: decision.transition.clone(),
            auto_actions: decision.auto_actions,
            reason,
            comments,
        })
    }

    pub async fn available_transitions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        group_code: &str,
        status_code: &str,
    ) -> Result<Vec<StatusTransition>, AppError> {
        let workflow = self.load_workflow(conn, tenant_id, group_code).await?;
        let transitions = workflow.available_from(status_code)?;
        Ok(transitions.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_utils::test_db;
    use crate::common::error::ErrorKind;
    use crate::models::status::StatusType;

    fn service() -> StatusService {
        StatusService::new(StatusRepository::new())
    }

    fn group_payload(code: &str) -> CreateStatusGroupPayload {
        CreateStatusGroupPayload {
            code: code.to_string(),
            name: "Pedidos de venda".into(),
            description: None,
            module: "SALES".into(),
            entity_type: "ORDER".into(),
            allow_custom_statuses: true,
            require_workflow: true,
        }
    }

    fn status_payload(code: &str, status_type: StatusType, is_default: bool) -> CreateStatusPayload {
        CreateStatusPayload {
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            status_type,
            display_order: 0,
            color: None,
            icon: None,
            is_default,
            is_editable: true,
            is_deletable: true,
            requires_approval: false,
            required_permission: None,
        }
    }

    fn transition_payload(from: Option<Uuid>, to: Uuid) -> CreateTransitionPayload {
        CreateTransitionPayload {
            from_status_id: from,
            to_status_id: to,
            transition_name: "Avançar".into(),
            requires_approval: false,
            requires_reason: false,
            required_permission: None,
            allowed_roles: vec![],
            validation_rules: None,
            auto_actions: None,
            display_order: 0,
        }
    }

    async fn defaults(svc: &StatusService, conn: &mut PgConnection, tenant_id: Uuid, group: &str) -> Vec<String> {
        svc.list_statuses(conn, tenant_id, group)
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.is_default)
            .map(|s| s.code)
            .collect()
    }

    #[tokio::test]
    async fn setting_a_default_status_leaves_exactly_one() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let group = test_db::unique_code("GRP");

        svc.create_group(&mut tx, tenant_id, group_payload(&group)).await.unwrap();
        svc.create_status(&mut tx, tenant_id, &group, status_payload("DRAFT", StatusType::Initial, true))
            .await
            .unwrap();
        svc.create_status(&mut tx, tenant_id, &group, status_payload("OPEN", StatusType::Intermediate, true))
            .await
            .unwrap();
        assert_eq!(defaults(&svc, &mut tx, tenant_id, &group).await, vec!["OPEN"]);

        let payload = UpdateStatusPayload { is_default: Some(true), ..Default::default() };
        svc.update_status(&mut tx, tenant_id, &group, "DRAFT", payload).await.unwrap();
        assert_eq!(defaults(&svc, &mut tx, tenant_id, &group).await, vec!["DRAFT"]);
    }

    #[tokio::test]
    async fn deactivated_status_stops_being_default() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let group = test_db::unique_code("GRP");

        svc.create_group(&mut tx, tenant_id, group_payload(&group)).await.unwrap();
        svc.create_status(&mut tx, tenant_id, &group, status_payload("DRAFT", StatusType::Initial, true))
            .await
            .unwrap();

        let payload = UpdateStatusPayload { is_active: Some(false), ..Default::default() };
        let status = svc.update_status(&mut tx, tenant_id, &group, "DRAFT", payload).await.unwrap();
        assert!(!status.is_active);
        assert!(!status.is_default);
        assert!(defaults(&svc, &mut tx, tenant_id, &group).await.is_empty());
    }

    #[tokio::test]
    async fn group_with_live_statuses_cannot_be_deleted() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let group = test_db::unique_code("GRP");

        svc.create_group(&mut tx, tenant_id, group_payload(&group)).await.unwrap();
        svc.create_status(&mut tx, tenant_id, &group, status_payload("DRAFT", StatusType::Initial, false))
            .await
            .unwrap();

        let err = svc.delete_group(&mut tx, tenant_id, &group).await.unwrap_err();
        assert!(matches!(err, AppError::StatusGroupHasStatuses(_)));
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        svc.delete_status(&mut tx, tenant_id, &group, "DRAFT").await.unwrap();
        svc.delete_group(&mut tx, tenant_id, &group).await.unwrap();

        assert!(matches!(
            svc.get_group(&mut tx, tenant_id, &group).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn system_group_cannot_be_deleted() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;

        let err = service().delete_group(&mut tx, tenant_id, "INV_RECEIPTS").await.unwrap_err();
        assert!(matches!(err, AppError::SystemResourceImmutable(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn transitions_stay_inside_their_group() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let (orders, returns) = (test_db::unique_code("GRP"), test_db::unique_code("GRP"));

        svc.create_group(&mut tx, tenant_id, group_payload(&orders)).await.unwrap();
        svc.create_group(&mut tx, tenant_id, group_payload(&returns)).await.unwrap();
        let draft = svc
            .create_status(&mut tx, tenant_id, &orders, status_payload("DRAFT", StatusType::Initial, true))
            .await
            .unwrap();
        let done = svc
            .create_status(&mut tx, tenant_id, &orders, status_payload("DONE", StatusType::Final, false))
            .await
            .unwrap();
        let foreign = svc
            .create_status(&mut tx, tenant_id, &returns, status_payload("OPEN", StatusType::Initial, true))
            .await
            .unwrap();

        let err = svc
            .create_transition(&mut tx, tenant_id, &orders, transition_payload(Some(draft.id), foreign.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusOutsideGroup { .. }));
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = svc
            .create_transition(&mut tx, tenant_id, &orders, transition_payload(Some(foreign.id), done.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusOutsideGroup { .. }));

        let ok = svc
            .create_transition(&mut tx, tenant_id, &orders, transition_payload(Some(draft.id), done.id))
            .await
            .unwrap();
        assert_eq!(ok.to_status_id, done.id);

        // Mover a transição para um status de outro grupo também é barrado
        let payload = UpdateTransitionPayload { to_status_id: Some(foreign.id), ..Default::default() };
        assert!(matches!(
            svc.update_transition(&mut tx, tenant_id, &orders, ok.id, payload).await,
            Err(AppError::StatusOutsideGroup { .. })
        ));

        // Por baixo do serviço, a FK composta barra o mesmo caso (por último: aborta a transação)
        let group = svc.group(&mut tx, tenant_id, &orders).await.unwrap();
        let bypass = svc
            .repo
            .create_transition(&mut *tx, group.id, &transition_payload(None, foreign.id))
            .await;
        assert!(matches!(bypass, Err(AppError::DatabaseError(_))));
    }
}
