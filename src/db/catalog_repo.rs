// src/db/catalog_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::common::error::{conflict_on_unique, AppError};
use crate::models::catalog::{
    AddUnitConversionPayload, CreateItemPayload, Item, ItemUnitConversion, UnitCategory,
    UnitOfMeasure, UnitPurpose,
};

const ITEM_COLUMNS: &str = r#"
    id, tenant_id, code, name, description, item_type, base_unit_id, is_inventoriable,
    current_stock, is_active, created_at, updated_at, deleted_at
"#;

const CONVERSION_COLUMNS: &str = r#"
    id, item_id, unit_id, purpose, factor, price, code, barcode, is_default, is_active,
    created_at, updated_at
"#;

// Sem pool próprio: toda consulta roda na conexão RLS da requisição
#[derive(Clone, Default)]
pub struct CatalogRepository;

impl CatalogRepository {
    pub fn new() -> Self {
        Self
    }

    // ---
    // Unidades (do sistema + do tenant)
    // ---

    pub async fn list_unit_categories<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<UnitCategory>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let categories = sqlx::query_as::<_, UnitCategory>(
            r#"
            SELECT id, tenant_id, code, name, is_active, created_at
            FROM unit_categories
            WHERE (tenant_id = $1 OR tenant_id IS NULL) AND is_active = true
            ORDER BY code
            "#,
        )
            .bind(tenant_id)
            .fetch_all(executor)
            .await?;
        Ok(categories)
    }

    pub async fn list_units<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Vec<UnitOfMeasure>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let units = sqlx::query_as::<_, UnitOfMeasure>(
            r#"
            SELECT id, tenant_id, category_id, code, name, symbol, conversion_factor,
                   is_base_unit, is_active, created_at
            FROM units_of_measure
            WHERE (tenant_id = $1 OR tenant_id IS NULL) AND is_active = true
              AND ($2::uuid IS NULL OR category_id = $2)
            ORDER BY category_id, is_base_unit DESC, code
            "#,
        )
            .bind(tenant_id)
            .bind(category_id)
            .fetch_all(executor)
            .await?;
        Ok(units)
    }

    pub async fn unit_exists<'e, E>(&self, executor: E, tenant_id: Uuid, unit_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM units_of_measure
                WHERE id = $1 AND (tenant_id = $2 OR tenant_id IS NULL) AND is_active = true
            )
            "#,
        )
            .bind(unit_id)
            .bind(tenant_id)
            .fetch_one(executor)
            .await?;
        Ok(exists)
    }

    // ---
    // Itens
    // ---

    pub async fn create_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payload: &CreateItemPayload,
    ) -> Result<Item, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO items
                (tenant_id, code, name, description, item_type, base_unit_id, is_inventoriable, current_stock)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(tenant_id)
            .bind(&payload.code)
            .bind(&payload.name)
            .bind(payload.description.as_deref())
            .bind(payload.item_type)
            .bind(payload.base_unit_id)
            .bind(payload.is_inventoriable)
            .bind(payload.current_stock)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("Item", &payload.code))
    }

    pub async fn find_item<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Item>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;
        Ok(item)
    }

    // ---
    // Conversões do item
    // ---

    pub async fn create_conversion<'e, E>(
        &self,
        executor: E,
        item_id: Uuid,
        payload: &AddUnitConversionPayload,
    ) -> Result<ItemUnitConversion, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO item_unit_conversions
                (item_id, unit_id, purpose, factor, price, code, barcode, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {CONVERSION_COLUMNS}"
        );
        let key = format!("{:?}/{}", payload.purpose, payload.unit_id);
        sqlx::query_as::<_, ItemUnitConversion>(&sql)
            .bind(item_id)
            .bind(payload.unit_id)
            .bind(payload.purpose)
            .bind(payload.factor)
            .bind(payload.price)
            .bind(payload.code.as_deref())
            .bind(payload.barcode.as_deref())
            .bind(payload.is_default)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("ItemUnitConversion", &key))
    }

    pub async fn find_conversion<'e, E>(
        &self,
        executor: E,
        item_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ItemUnitConversion>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {CONVERSION_COLUMNS} FROM item_unit_conversions WHERE id = $1 AND item_id = $2"
        );
        let conversion = sqlx::query_as::<_, ItemUnitConversion>(&sql)
            .bind(id)
            .bind(item_id)
            .fetch_optional(executor)
            .await?;
        Ok(conversion)
    }

    /// Conversões ativas, por propósito e com o default primeiro.
    pub async fn list_conversions<'e, E>(
        &self,
        executor: E,
        item_id: Uuid,
        purpose: Option<UnitPurpose>,
    ) -> Result<Vec<ItemUnitConversion>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {CONVERSION_COLUMNS} FROM item_unit_conversions
             WHERE item_id = $1 AND is_active = true
               AND ($2::unit_purpose IS NULL OR purpose = $2)
             ORDER BY purpose, is_default DESC, factor"
        );
        let conversions = sqlx::query_as::<_, ItemUnitConversion>(&sql)
            .bind(item_id)
            .bind(purpose)
            .fetch_all(executor)
            .await?;
        Ok(conversions)
    }

    pub async fn clear_default_conversion<'e, E>(
        &self,
        executor: E,
        item_id: Uuid,
        purpose: UnitPurpose,
        keep: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE item_unit_conversions SET is_default = false, updated_at = NOW()
            WHERE item_id = $1 AND purpose = $2 AND is_default = true
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
            .bind(item_id)
            .bind(purpose)
            .bind(keep)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn mark_default_conversion<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<ItemUnitConversion, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE item_unit_conversions SET is_default = true, updated_at = NOW()
             WHERE id = $1
             RETURNING {CONVERSION_COLUMNS}"
        );
        let conversion = sqlx::query_as::<_, ItemUnitConversion>(&sql)
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(conversion)
    }

    pub async fn delete_conversion<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM item_unit_conversions WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
