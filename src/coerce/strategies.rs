//! coerce::strategies
//!
//! The built-in coercion strategies.
//!
//! Four built-ins cover the stock assignment paths: [`ExactMatch`] for
//! values already in the right shape, [`StorageWiden`] for lossless kind
//! conversions, [`MeasurableToNumber`] for internal-SI-unit measurables
//! headed into plain numeric storage, and [`Composite`] chaining an ordered
//! delegate list. The default chain tries exact, then widen, then
//! measurable.

use std::sync::Arc;

use crate::core::types::{DisplayUnit, ParamValue, Quantity, StorageKind};

use super::{CoerceError, CoercionContext, CoercionStrategy};

const LB_PER_KG: f64 = 2.204_622_62;
const FT_PER_M: f64 = 3.280_839_9;

/// Nominal North American voltage bands; free-form voltage readings within
/// 5% of a band snap to it.
const VOLTAGE_BANDS: &[f64] = &[120.0, 208.0, 240.0];
const VOLTAGE_BAND_TOLERANCE: f64 = 0.05;

/// Strict pass-through: the value already matches the target storage and
/// carries no unit to convert.
pub struct ExactMatch;

impl CoercionStrategy for ExactMatch {
    fn name(&self) -> &str {
        "exact"
    }

    fn can_map(&self, ctx: &CoercionContext) -> bool {
        !ctx.quantity.is_measurable() && ctx.value.storage_kind() == ctx.target_storage
    }

    fn map(&self, ctx: &CoercionContext) -> Result<ParamValue, CoerceError> {
        if !self.can_map(ctx) {
            return Err(ctx.no_strategy());
        }
        Ok(ctx.value.clone())
    }
}

/// Lossless storage-kind conversion for plain values.
///
/// - integer into double storage
/// - any number into text storage (display rendering)
/// - numeric text into integer or double storage
pub struct StorageWiden;

impl StorageWiden {
    fn parse_text(text: &str, target: StorageKind) -> Result<ParamValue, CoerceError> {
        let trimmed = text.trim();
        match target {
            StorageKind::Integer => trimmed
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| CoerceError::Unparseable { text: text.into() }),
            StorageKind::Double => trimmed
                .parse::<f64>()
                .map(ParamValue::Double)
                .map_err(|_| CoerceError::Unparseable { text: text.into() }),
            StorageKind::Text => Ok(ParamValue::Text(text.into())),
        }
    }
}

impl CoercionStrategy for StorageWiden {
    fn name(&self) -> &str {
        "widen"
    }

    fn can_map(&self, ctx: &CoercionContext) -> bool {
        if ctx.quantity.is_measurable() {
            return false;
        }
        match (&ctx.value, ctx.target_storage) {
            (ParamValue::Integer(_), StorageKind::Double) => true,
            (ParamValue::Integer(_) | ParamValue::Double(_), StorageKind::Text) => true,
            (ParamValue::Text(t), StorageKind::Integer) => t.trim().parse::<i64>().is_ok(),
            (ParamValue::Text(t), StorageKind::Double) => t.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }

    fn map(&self, ctx: &CoercionContext) -> Result<ParamValue, CoerceError> {
        if ctx.quantity.is_measurable() {
            return Err(ctx.no_strategy());
        }
        match (&ctx.value, ctx.target_storage) {
            (ParamValue::Integer(i), StorageKind::Double) => Ok(ParamValue::Double(*i as f64)),
            (ParamValue::Integer(_) | ParamValue::Double(_), StorageKind::Text) => {
                Ok(ParamValue::Text(ctx.value.to_string()))
            }
            (ParamValue::Text(t), target) if target.is_numeric() => Self::parse_text(t, target),
            _ => Err(ctx.no_strategy()),
        }
    }
}

/// Converts an internal-SI-unit measurable into a plain number in the
/// quantity's fixed display unit.
///
/// Mass exports as pounds, length as feet, electrical potential as volts
/// with nominal-band snapping. Voltage sources may also arrive as free text
/// ("208V", "208 volts") from legacy documents.
pub struct MeasurableToNumber;

impl MeasurableToNumber {
    /// Fixed export unit per measurable quantity.
    pub fn display_unit(quantity: Quantity) -> Option<DisplayUnit> {
        match quantity {
            Quantity::Plain => None,
            Quantity::Mass => Some(DisplayUnit::Pounds),
            Quantity::Length => Some(DisplayUnit::Feet),
            Quantity::ElectricalPotential => Some(DisplayUnit::Volts),
        }
    }

    fn parse_voltage_text(text: &str) -> Option<f64> {
        let trimmed = text.trim();
        let numeric = trimmed
            .trim_end_matches(|c: char| c.is_ascii_alphabetic())
            .trim();
        numeric.parse::<f64>().ok()
    }

    fn snap_voltage(volts: f64) -> f64 {
        for band in VOLTAGE_BANDS {
            if (volts - band).abs() <= band * VOLTAGE_BAND_TOLERANCE {
                return *band;
            }
        }
        volts
    }

    fn source_number(ctx: &CoercionContext) -> Result<f64, CoerceError> {
        if let Some(n) = ctx.value.as_f64() {
            return Ok(n);
        }
        // Only voltage readings arrive as free text.
        if ctx.quantity == Quantity::ElectricalPotential {
            if let ParamValue::Text(t) = &ctx.value {
                return Self::parse_voltage_text(t)
                    .ok_or_else(|| CoerceError::Unparseable { text: t.clone() });
            }
        }
        Err(ctx.no_strategy())
    }
}

impl CoercionStrategy for MeasurableToNumber {
    fn name(&self) -> &str {
        "measurable"
    }

    fn can_map(&self, ctx: &CoercionContext) -> bool {
        if !ctx.quantity.is_measurable() || !ctx.target_storage.is_numeric() {
            return false;
        }
        match &ctx.value {
            ParamValue::Integer(_) | ParamValue::Double(_) => true,
            ParamValue::Text(t) => {
                ctx.quantity == Quantity::ElectricalPotential
                    && Self::parse_voltage_text(t).is_some()
            }
        }
    }

    fn map(&self, ctx: &CoercionContext) -> Result<ParamValue, CoerceError> {
        if !ctx.quantity.is_measurable() || !ctx.target_storage.is_numeric() {
            return Err(ctx.no_strategy());
        }
        let source = Self::source_number(ctx)?;
        let converted = match ctx.quantity {
            Quantity::Plain => return Err(ctx.no_strategy()),
            Quantity::Mass => source * LB_PER_KG,
            Quantity::Length => source * FT_PER_M,
            Quantity::ElectricalPotential => Self::snap_voltage(source),
        };
        match ctx.target_storage {
            StorageKind::Integer => Ok(ParamValue::Integer(converted.round() as i64)),
            _ => Ok(ParamValue::Double(converted)),
        }
    }
}

/// Tries an ordered list of delegates; the first whose `can_map` succeeds
/// performs the mapping.
pub struct Composite {
    name: String,
    delegates: Vec<Arc<dyn CoercionStrategy + Send + Sync>>,
}

impl Composite {
    /// Build a named composite over ordered delegates.
    pub fn new(
        name: impl Into<String>,
        delegates: Vec<Arc<dyn CoercionStrategy + Send + Sync>>,
    ) -> Self {
        Self {
            name: name.into(),
            delegates,
        }
    }

    /// The stock chain: exact, then widen, then measurable.
    pub fn default_chain() -> Self {
        Self::new(
            "composite",
            vec![
                Arc::new(ExactMatch),
                Arc::new(StorageWiden),
                Arc::new(MeasurableToNumber),
            ],
        )
    }
}

impl CoercionStrategy for Composite {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_map(&self, ctx: &CoercionContext) -> bool {
        self.delegates.iter().any(|d| d.can_map(ctx))
    }

    fn map(&self, ctx: &CoercionContext) -> Result<ParamValue, CoerceError> {
        for delegate in &self.delegates {
            if delegate.can_map(ctx) {
                return delegate.map(ctx);
            }
        }
        Err(ctx.no_strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(value: ParamValue, target: StorageKind) -> CoercionContext {
        CoercionContext::plain(value, target)
    }

    mod exact_match {
        use super::*;

        #[test]
        fn passes_matching_storage_through() {
            let ctx = plain(ParamValue::Double(2.5), StorageKind::Double);
            assert!(ExactMatch.can_map(&ctx));
            assert_eq!(ExactMatch.map(&ctx).unwrap(), ParamValue::Double(2.5));
        }

        #[test]
        fn rejects_kind_mismatch() {
            let ctx = plain(ParamValue::Integer(3), StorageKind::Double);
            assert!(!ExactMatch.can_map(&ctx));
            assert!(ExactMatch.map(&ctx).is_err());
        }

        #[test]
        fn rejects_measurables() {
            let ctx = CoercionContext::measurable(
                ParamValue::Double(1.0),
                Quantity::Mass,
                StorageKind::Double,
            );
            assert!(!ExactMatch.can_map(&ctx));
        }
    }

    mod storage_widen {
        use super::*;

        #[test]
        fn integer_widens_to_double() {
            let ctx = plain(ParamValue::Integer(7), StorageKind::Double);
            assert_eq!(StorageWiden.map(&ctx).unwrap(), ParamValue::Double(7.0));
        }

        #[test]
        fn number_renders_into_text() {
            let ctx = plain(ParamValue::Double(2.5), StorageKind::Text);
            assert_eq!(
                StorageWiden.map(&ctx).unwrap(),
                ParamValue::Text("2.5".into())
            );
        }

        #[test]
        fn numeric_text_parses_to_target_kind() {
            let ctx = plain(ParamValue::Text(" 42 ".into()), StorageKind::Integer);
            assert_eq!(StorageWiden.map(&ctx).unwrap(), ParamValue::Integer(42));

            let ctx = plain(ParamValue::Text("2.75".into()), StorageKind::Double);
            assert_eq!(StorageWiden.map(&ctx).unwrap(), ParamValue::Double(2.75));
        }

        #[test]
        fn non_numeric_text_refused() {
            let ctx = plain(ParamValue::Text("wide".into()), StorageKind::Double);
            assert!(!StorageWiden.can_map(&ctx));
        }

        #[test]
        fn double_never_narrows_to_integer() {
            let ctx = plain(ParamValue::Double(2.5), StorageKind::Integer);
            assert!(!StorageWiden.can_map(&ctx));
        }
    }

    mod measurable_to_number {
        use super::*;

        fn measurable(value: ParamValue, quantity: Quantity) -> CoercionContext {
            CoercionContext::measurable(value, quantity, StorageKind::Double)
        }

        #[test]
        fn mass_exports_as_pounds() {
            let ctx = measurable(ParamValue::Double(10.0), Quantity::Mass);
            let out = MeasurableToNumber.map(&ctx).unwrap();
            let ParamValue::Double(lb) = out else { panic!() };
            assert!((lb - 22.0462262).abs() < 1e-6);
        }

        #[test]
        fn length_exports_as_feet() {
            let ctx = measurable(ParamValue::Double(2.0), Quantity::Length);
            let out = MeasurableToNumber.map(&ctx).unwrap();
            let ParamValue::Double(ft) = out else { panic!() };
            assert!((ft - 6.5616798).abs() < 1e-6);
        }

        #[test]
        fn voltage_snaps_to_nominal_band() {
            for (reading, expected) in [(118.0, 120.0), (210.0, 208.0), (239.0, 240.0)] {
                let ctx = measurable(
                    ParamValue::Double(reading),
                    Quantity::ElectricalPotential,
                );
                assert_eq!(
                    MeasurableToNumber.map(&ctx).unwrap(),
                    ParamValue::Double(expected),
                    "reading {reading}"
                );
            }
        }

        #[test]
        fn voltage_outside_bands_kept_raw() {
            let ctx = measurable(ParamValue::Double(480.0), Quantity::ElectricalPotential);
            assert_eq!(
                MeasurableToNumber.map(&ctx).unwrap(),
                ParamValue::Double(480.0)
            );
        }

        #[test]
        fn voltage_free_text_parses_and_snaps() {
            for text in ["208V", "208 volts", " 207.5V "] {
                let ctx = measurable(
                    ParamValue::Text(text.into()),
                    Quantity::ElectricalPotential,
                );
                assert!(MeasurableToNumber.can_map(&ctx), "{text}");
                assert_eq!(
                    MeasurableToNumber.map(&ctx).unwrap(),
                    ParamValue::Double(208.0),
                    "{text}"
                );
            }
        }

        #[test]
        fn free_text_rejected_for_other_quantities() {
            let ctx = measurable(ParamValue::Text("10kg".into()), Quantity::Mass);
            assert!(!MeasurableToNumber.can_map(&ctx));
        }

        #[test]
        fn integer_target_rounds() {
            let ctx = CoercionContext::measurable(
                ParamValue::Double(1.0),
                Quantity::Mass,
                StorageKind::Integer,
            );
            assert_eq!(
                MeasurableToNumber.map(&ctx).unwrap(),
                ParamValue::Integer(2)
            );
        }

        #[test]
        fn plain_values_refused() {
            let ctx = plain(ParamValue::Double(1.0), StorageKind::Double);
            assert!(!MeasurableToNumber.can_map(&ctx));
        }
    }

    mod composite {
        use super::*;

        #[test]
        fn first_willing_delegate_wins() {
            let chain = Composite::default_chain();
            // Exact handles this; widen would too, but never gets asked.
            let ctx = plain(ParamValue::Double(1.0), StorageKind::Double);
            assert_eq!(chain.map(&ctx).unwrap(), ParamValue::Double(1.0));
        }

        #[test]
        fn falls_through_to_later_delegates() {
            let chain = Composite::default_chain();
            let ctx = CoercionContext::measurable(
                ParamValue::Double(118.0),
                Quantity::ElectricalPotential,
                StorageKind::Double,
            );
            assert_eq!(chain.map(&ctx).unwrap(), ParamValue::Double(120.0));
        }

        #[test]
        fn fails_when_no_delegate_accepts() {
            let chain = Composite::default_chain();
            let ctx = plain(ParamValue::Text("unmappable".into()), StorageKind::Integer);
            assert!(!chain.can_map(&ctx));
            assert!(matches!(
                chain.map(&ctx).unwrap_err(),
                CoerceError::NoStrategy { .. }
            ));
        }
    }
}
