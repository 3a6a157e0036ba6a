// src/services/unit_conversion.rs
//
// Conversão de quantidades entre unidades de um item. Funções puras: o serviço
// de catálogo carrega as conversões ativas e chama estas funções.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::catalog::{ConversionResult, ItemUnitConversion, StockInUnit};

/// Menor fator aceito (1e-8). Abaixo disso a divisão explode.
pub const MIN_FACTOR: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// Limite exclusivo (1e12): a coluna é NUMERIC(20, 8), doze dígitos inteiros.
pub const MAX_FACTOR: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

pub fn check_factor(factor: Decimal) -> Result<Decimal, AppError> {
    if factor < MIN_FACTOR || factor >= MAX_FACTOR {
        return Err(AppError::InvalidConversionFactor(factor.to_string()));
    }
    Ok(factor)
}

/// `quantity` em `from_unit_id` -> `to_unit_id`, passando pela unidade-base do item.
/// `conversions` deve conter só as conversões ativas do item.
pub fn convert(
    item_id: Uuid,
    conversions: &[ItemUnitConversion],
    from_unit_id: Uuid,
    to_unit_id: Uuid,
    quantity: Decimal,
) -> Result<ConversionResult, AppError> {
    if from_unit_id == to_unit_id {
        return Ok(ConversionResult {
            item_id,
            from_unit_id,
            to_unit_id,
            quantity,
            base_quantity: quantity,
            converted_quantity: quantity,
        });
    }

    let factor_of = |unit_id: Uuid| {
        conversions
            .iter()
            .find(|c| c.is_active && c.unit_id == unit_id)
            .map(|c| c.factor)
    };

    let from_factor = factor_of(from_unit_id).ok_or(AppError::SourceUnitNotConfigured)?;
    let to_factor = factor_of(to_unit_id).ok_or(AppError::TargetUnitNotConfigured)?;
    let from_factor = check_factor(from_factor)?;
    let to_factor = check_factor(to_factor)?;

    let base_quantity = quantity
        .checked_mul(from_factor)
        .ok_or_else(|| AppError::QuantityOutOfRange(quantity.to_string()))?;
    let converted_quantity = base_quantity
        .checked_div(to_factor)
        .ok_or_else(|| AppError::QuantityOutOfRange(quantity.to_string()))?
        .normalize();

    Ok(ConversionResult {
        item_id,
        from_unit_id,
        to_unit_id,
        quantity,
        base_quantity: base_quantity.normalize(),
        converted_quantity,
    })
}

/// Estoque atual (em unidade-base) expresso em cada conversão ativa.
pub fn stock_in_units(
    current_stock: Decimal,
    conversions: &[ItemUnitConversion],
) -> Result<Vec<StockInUnit>, AppError> {
    conversions
        .iter()
        .filter(|c| c.is_active)
        .map(|c| {
            let factor = check_factor(c.factor)?;
            let quantity = current_stock
                .checked_div(factor)
                .ok_or_else(|| AppError::QuantityOutOfRange(current_stock.to_string()))?;
            Ok(StockInUnit {
                purpose: c.purpose,
                unit_id: c.unit_id,
                quantity: quantity.normalize(),
                is_default: c.is_default,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::UnitPurpose;
    use chrono::Utc;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn conversion(unit_id: Uuid, purpose: UnitPurpose, factor: Decimal, is_default: bool) -> ItemUnitConversion {
        let now = Utc::now();
        ItemUnitConversion {
            id: Uuid::new_v4(),
            item_id: Uuid::nil(),
            unit_id,
            purpose,
            factor,
            price: None,
            code: None,
            barcode: None,
            is_default,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn three_boxes_are_thirty_six_units() {
        // PROD-001: caixa com 12, unidade = base
        let (box_id, unit_id) = (Uuid::new_v4(), Uuid::new_v4());
        let convs = vec![
            conversion(box_id, UnitPurpose::Purchase, dec("12"), true),
            conversion(unit_id, UnitPurpose::Sale, dec("1"), true),
        ];

        let result = convert(Uuid::nil(), &convs, box_id, unit_id, dec("3")).unwrap();
        assert_eq!(result.converted_quantity, dec("36"));
        assert_eq!(result.base_quantity, dec("36"));

        let back = convert(Uuid::nil(), &convs, unit_id, box_id, dec("36")).unwrap();
        assert_eq!(back.converted_quantity, dec("3"));
    }

    #[test]
    fn same_unit_needs_no_configuration() {
        let unit = Uuid::new_v4();
        let result = convert(Uuid::nil(), &[], unit, unit, dec("7.5")).unwrap();
        assert_eq!(result.converted_quantity, dec("7.5"));
    }

    #[test]
    fn missing_units_are_reported_separately() {
        let known = Uuid::new_v4();
        let convs = vec![conversion(known, UnitPurpose::Storage, dec("1"), false)];

        assert!(matches!(
            convert(Uuid::nil(), &convs, Uuid::new_v4(), known, Decimal::ONE),
            Err(AppError::SourceUnitNotConfigured)
        ));
        assert!(matches!(
            convert(Uuid::nil(), &convs, known, Uuid::new_v4(), Decimal::ONE),
            Err(AppError::TargetUnitNotConfigured)
        ));
    }

    #[test]
    fn inactive_conversions_do_not_count() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut inactive = conversion(b, UnitPurpose::Sale, dec("6"), false);
        inactive.is_active = false;
        let convs = vec![conversion(a, UnitPurpose::Sale, dec("1"), true), inactive];

        assert!(matches!(
            convert(Uuid::nil(), &convs, a, b, Decimal::ONE),
            Err(AppError::TargetUnitNotConfigured)
        ));
    }

    #[test]
    fn near_zero_factor_is_rejected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let convs = vec![
            conversion(a, UnitPurpose::Sale, dec("1"), true),
            conversion(b, UnitPurpose::Sale, dec("0.000000001"), false),
        ];
        assert!(matches!(
            convert(Uuid::nil(), &convs, a, b, Decimal::ONE),
            Err(AppError::InvalidConversionFactor(_))
        ));
        assert!(check_factor(MIN_FACTOR).is_ok());
        assert!(check_factor(Decimal::ZERO).is_err());
    }

    #[test]
    fn factor_must_fit_the_storage_column() {
        assert_eq!(MAX_FACTOR, dec("1000000000000"));
        assert!(check_factor(dec("999999999999.99999999")).is_ok());
        assert!(matches!(
            check_factor(dec("1000000000000")),
            Err(AppError::InvalidConversionFactor(_))
        ));
        assert!(check_factor(dec("10000000000000")).is_err());
    }

    #[test]
    fn huge_quantities_are_rejected_instead_of_overflowing() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let convs = vec![
            conversion(a, UnitPurpose::Purchase, dec("12"), true),
            conversion(b, UnitPurpose::Sale, dec("0.00000001"), false),
        ];

        let err = convert(Uuid::nil(), &convs, a, b, Decimal::MAX).unwrap_err();
        assert!(matches!(err, AppError::QuantityOutOfRange(_)));
        assert_eq!(err.kind(), crate::common::error::ErrorKind::ValidationError);

        // 1e21 / 1e-8 estoura na divisão
        let unit = Uuid::new_v4();
        let convs = vec![
            conversion(unit, UnitPurpose::Storage, dec("1"), true),
            conversion(b, UnitPurpose::Sale, dec("0.00000001"), false),
        ];
        assert!(matches!(
            convert(Uuid::nil(), &convs, unit, b, dec("1000000000000000000000")),
            Err(AppError::QuantityOutOfRange(_))
        ));
    }

    #[test]
    fn huge_stock_in_tiny_unit_is_rejected() {
        let b = Uuid::new_v4();
        let convs = vec![conversion(b, UnitPurpose::Sale, dec("0.00000001"), false)];
        assert!(matches!(
            stock_in_units(Decimal::MAX, &convs),
            Err(AppError::QuantityOutOfRange(_))
        ));
    }

    #[test]
    fn stock_is_expressed_in_every_unit() {
        let (box_id, unit_id, pack_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let convs = vec![
            conversion(box_id, UnitPurpose::Purchase, dec("12"), true),
            conversion(unit_id, UnitPurpose::Sale, dec("1"), true),
            conversion(pack_id, UnitPurpose::Sale, dec("6"), false),
        ];

        let stock = stock_in_units(dec("36"), &convs).unwrap();
        let quantities: Vec<_> = stock.iter().map(|s| (s.unit_id, s.quantity)).collect();
        assert_eq!(
            quantities,
            vec![(box_id, dec("3")), (unit_id, dec("36")), (pack_id, dec("6"))]
        );
        assert!(stock[0].is_default && !stock[2].is_default);
    }

    proptest! {
        #[test]
        fn round_trip_returns_the_original_quantity(
            q in 0u32..1_000_000,
            fa in 1u32..10_000,
            fb in 1u32..10_000,
        ) {
            let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
            let convs = vec![
                conversion(a, UnitPurpose::Storage, Decimal::from(fa), false),
                conversion(b, UnitPurpose::Sale, Decimal::from(fb), false),
            ];
            let quantity = Decimal::from(q);

            let there = convert(Uuid::nil(), &convs, a, b, quantity).unwrap();
            let back = convert(Uuid::nil(), &convs, b, a, there.converted_quantity).unwrap();

            let tolerance = Decimal::new(1, 12);
            prop_assert!((back.converted_quantity - quantity).abs() <= tolerance);
        }
    }
}
