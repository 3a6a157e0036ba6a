// src/services/catalog_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::CatalogRepository;
use crate::models::catalog::{
    AddUnitConversionPayload, ConversionResult, CreateItemPayload, Item, ItemUnitConversion,
    StockInAllUnits, UnitCategory, UnitOfMeasure, UnitPurpose,
};
use crate::services::unit_conversion;

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
}

impl CatalogService {
    pub fn new(repo: CatalogRepository) -> Self {
        Self { repo }
    }

    // ---
    // Unidades
    // ---

    pub async fn list_unit_categories(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
    ) -> Result<Vec<UnitCategory>, AppError> {
        self.repo.list_unit_categories(conn, tenant_id).await
    }

    pub async fn list_units(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Vec<UnitOfMeasure>, AppError> {
        self.repo.list_units(conn, tenant_id, category_id).await
    }

    async fn ensure_unit(&self, conn: &mut PgConnection, tenant_id: Uuid, unit_id: Uuid) -> Result<(), AppError> {
        if !self.repo.unit_exists(conn, tenant_id, unit_id).await? {
            return Err(AppError::not_found("UnitOfMeasure", unit_id));
        }
        Ok(())
    }

    // ---
    // Itens
    // ---

    pub async fn create_item(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        payload: CreateItemPayload,
    ) -> Result<Item, AppError> {
        self.ensure_unit(&mut *conn, tenant_id, payload.base_unit_id).await?;
        let item = self.repo.create_item(&mut *conn, tenant_id, &payload).await?;

        tracing::info!(item = %item.code, "item criado");
        Ok(item)
    }

    pub async fn get_item(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Item, AppError> {
        self.repo
            .find_item(conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Item", id))
    }

    // ---
    // Conversões
    // ---

    /// Vincula uma unidade ao item para um propósito. Se vier como default,
    /// o default anterior do mesmo propósito é desmarcado na mesma transação.
    pub async fn add_conversion(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        item_id: Uuid,
        payload: AddUnitConversionPayload,
    ) -> Result<ItemUnitConversion, AppError> {
        unit_conversion::check_factor(payload.factor)?;

        let mut tx = conn.begin().await?;
        self.get_item(&mut tx, tenant_id, item_id).await?;
        self.ensure_unit(&mut tx, tenant_id, payload.unit_id).await?;

        if payload.is_default {
            self.repo
                .clear_default_conversion(&mut *tx, item_id, payload.purpose, None)
                .await?;
        }
        let conversion = self.repo.create_conversion(&mut *tx, item_id, &payload).await?;
        tx.commit().await?;

        tracing::info!(%item_id, purpose = ?conversion.purpose, factor = %conversion.factor, "conversão adicionada");
        Ok(conversion)
    }

    pub async fn list_conversions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        item_id: Uuid,
        purpose: Option<UnitPurpose>,
    ) -> Result<Vec<ItemUnitConversion>, AppError> {
        self.get_item(&mut *conn, tenant_id, item_id).await?;
        self.repo.list_conversions(&mut *conn, item_id, purpose).await
    }

    pub async fn set_default_conversion(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        item_id: Uuid,
        conversion_id: Uuid,
    ) -> Result<ItemUnitConversion, AppError> {
        let mut tx = conn.begin().await?;
        self.get_item(&mut tx, tenant_id, item_id).await?;
        let conversion = self
            .repo
            .find_conversion(&mut *tx, item_id, conversion_id)
            .await?
            .ok_or_else(|| AppError::not_found("ItemUnitConversion", conversion_id))?;

        self.repo
            .clear_default_conversion(&mut *tx, item_id, conversion.purpose, Some(conversion.id))
            .await?;
        let conversion = self.repo.mark_default_conversion(&mut *tx, conversion.id).await?;
        tx.commit().await?;
        Ok(conversion)
    }

    pub async fn remove_conversion(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        item_id: Uuid,
        conversion_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;
        self.get_item(&mut tx, tenant_id, item_id).await?;
        self.repo
            .find_conversion(&mut *tx, item_id, conversion_id)
            .await?
            .ok_or_else(|| AppError::not_found("ItemUnitConversion", conversion_id))?;
        self.repo.delete_conversion(&mut *tx, conversion_id).await?;
        tx.commit().await?;

        tracing::info!(%item_id, %conversion_id, "conversão removida");
        Ok(())
    }

    /// Converte uma quantidade entre duas unidades configuradas no item.
    pub async fn convert_quantity(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        item_id: Uuid,
        from_unit_id: Uuid,
        to_unit_id: Uuid,
        quantity: Decimal,
    ) -> Result<ConversionResult, AppError> {
        self.get_item(&mut *conn, tenant_id, item_id).await?;
        let conversions = self.repo.list_conversions(&mut *conn, item_id, None).await?;
        unit_conversion::convert(item_id, &conversions, from_unit_id, to_unit_id, quantity)
    }

    pub async fn stock_in_all_units(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<StockInAllUnits, AppError> {
        let item = self.get_item(&mut *conn, tenant_id, item_id).await?;
        let base_stock = match (item.is_inventoriable, item.current_stock) {
            (true, Some(stock)) => stock,
            _ => return Err(AppError::ItemNotInventoriable),
        };

        let conversions = self.repo.list_conversions(&mut *conn, item_id, None).await?;
        let stock_in_units = unit_conversion::stock_in_units(base_stock, &conversions)?;

        Ok(StockInAllUnits {
            item_id: item.id,
            item_code: item.code,
            base_unit_id: item.base_unit_id,
            base_stock,
            stock_in_units,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_utils::test_db;
    use crate::models::catalog::ItemType;

    fn service() -> CatalogService {
        CatalogService::new(CatalogRepository::new())
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn conversion(unit_id: Uuid, purpose: UnitPurpose, factor: &str, is_default: bool) -> AddUnitConversionPayload {
        AddUnitConversionPayload {
            purpose,
            unit_id,
            factor: dec(factor),
            price: None,
            code: None,
            barcode: None,
            is_default,
        }
    }

    // Item com unidade-base UNIT e as unidades semeadas UNIT/DOZEN
    async fn item_with_units(svc: &CatalogService, conn: &mut PgConnection, tenant_id: Uuid) -> (Item, Uuid, Uuid) {
        let units = svc.list_units(&mut *conn, tenant_id, None).await.unwrap();
        let unit_of = |code: &str| units.iter().find(|u| u.code == code).map(|u| u.id).unwrap();
        let (unit, dozen) = (unit_of("UNIT"), unit_of("DOZEN"));

        let payload = CreateItemPayload {
            code: test_db::unique_code("PROD"),
            name: "Parafuso".into(),
            description: None,
            item_type: ItemType::Product,
            base_unit_id: unit,
            is_inventoriable: true,
            current_stock: Some(dec("36")),
        };
        let item = svc.create_item(&mut *conn, tenant_id, payload).await.unwrap();
        (item, unit, dozen)
    }

    fn default_units(conversions: &[ItemUnitConversion], purpose: UnitPurpose) -> Vec<Uuid> {
        conversions
            .iter()
            .filter(|c| c.purpose == purpose && c.is_default)
            .map(|c| c.unit_id)
            .collect()
    }

    #[tokio::test]
    async fn one_default_conversion_per_purpose() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let (item, unit, dozen) = item_with_units(&svc, &mut tx, tenant_id).await;

        let by_unit = svc
            .add_conversion(&mut tx, tenant_id, item.id, conversion(unit, UnitPurpose::Sale, "1", true))
            .await
            .unwrap();
        svc.add_conversion(&mut tx, tenant_id, item.id, conversion(dozen, UnitPurpose::Sale, "12", true))
            .await
            .unwrap();
        svc.add_conversion(&mut tx, tenant_id, item.id, conversion(dozen, UnitPurpose::Purchase, "12", true))
            .await
            .unwrap();

        let all = svc.list_conversions(&mut tx, tenant_id, item.id, None).await.unwrap();
        assert_eq!(default_units(&all, UnitPurpose::Sale), vec![dozen]);
        assert_eq!(default_units(&all, UnitPurpose::Purchase), vec![dozen]);

        svc.set_default_conversion(&mut tx, tenant_id, item.id, by_unit.id).await.unwrap();
        let all = svc.list_conversions(&mut tx, tenant_id, item.id, None).await.unwrap();
        assert_eq!(default_units(&all, UnitPurpose::Sale), vec![unit]);
        // O outro propósito não é afetado
        assert_eq!(default_units(&all, UnitPurpose::Purchase), vec![dozen]);
    }

    #[tokio::test]
    async fn duplicate_unit_for_the_same_purpose_conflicts() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let (item, _, dozen) = item_with_units(&svc, &mut tx, tenant_id).await;

        svc.add_conversion(&mut tx, tenant_id, item.id, conversion(dozen, UnitPurpose::Sale, "12", false))
            .await
            .unwrap();
        let err = svc
            .add_conversion(&mut tx, tenant_id, item.id, conversion(dozen, UnitPurpose::Sale, "12", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn oversized_factor_is_a_validation_error() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let (item, _, dozen) = item_with_units(&svc, &mut tx, tenant_id).await;

        let err = svc
            .add_conversion(&mut tx, tenant_id, item.id, conversion(dozen, UnitPurpose::Sale, "10000000000000", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidConversionFactor(_)));
    }

    #[tokio::test]
    async fn conversion_and_stock_go_through_the_item_units() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let tenant_id = test_db::tenant(&mut tx).await;
        let svc = service();
        let (item, unit, dozen) = item_with_units(&svc, &mut tx, tenant_id).await;

        svc.add_conversion(&mut tx, tenant_id, item.id, conversion(unit, UnitPurpose::Storage, "1", true))
            .await
            .unwrap();
        svc.add_conversion(&mut tx, tenant_id, item.id, conversion(dozen, UnitPurpose::Purchase, "12", true))
            .await
            .unwrap();

        let result = svc
            .convert_quantity(&mut tx, tenant_id, item.id, dozen, unit, dec("3"))
            .await
            .unwrap();
        assert_eq!(result.converted_quantity, dec("36"));

        let err = svc
            .convert_quantity(&mut tx, tenant_id, item.id, dozen, unit, Decimal::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuantityOutOfRange(_)));

        let stock = svc.stock_in_all_units(&mut tx, tenant_id, item.id).await.unwrap();
        let dozens = stock.stock_in_units.iter().find(|s| s.unit_id == dozen).unwrap();
        assert_eq!(dozens.quantity, dec("3"));
    }
}
