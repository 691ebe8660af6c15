//! Distribution of trades over the classifications of a taxonomy

use std::borrow::Cow;
use std::collections::HashMap;

use super::category::TradeCategory;
use super::error::TradeError;
use super::trade::Trade;
use super::TradeContext;
use crate::pp::{
    Classification, ClassificationAssignment, Taxonomy, TaxonomyVisitor, ONE_HUNDRED_PERCENT,
    UNASSIGNED_ID,
};

/// Name of the category collecting the unassigned remainder
const UNASSIGNED_NAME: &str = "Without classification";

/// Creates one category per classification and pushes the trades of every
/// assigned security into it
struct CategoryBuilder<'a, 'b> {
    context: &'b TradeContext<'a>,
    trades: &'a [Trade],
    /// security uuid -> positions in `trades`
    by_security: HashMap<&'a str, Vec<usize>>,
    /// assigned weight per trade position, in hundredths of a percent
    assigned: Vec<i32>,
    categories: Vec<TradeCategory<'a>>,
}

impl<'a> TaxonomyVisitor<'a> for CategoryBuilder<'a, '_> {
    fn visit_classification(&mut self, classification: &'a Classification) {
        self.categories
            .push(TradeCategory::new(Cow::Borrowed(classification), self.context));
    }

    fn visit_assignment(
        &mut self,
        _classification: &'a Classification,
        assignment: &'a ClassificationAssignment,
    ) {
        if !assignment.is_security() {
            return;
        }
        let Some(positions) = self.by_security.get(assignment.vehicle_uuid.as_str()) else {
            return;
        };
        // assignments follow their classification
        let Some(category) = self.categories.last_mut() else {
            return;
        };

        let trades = self.trades;
        let weight = assignment.weight as f64 / ONE_HUNDRED_PERCENT as f64;
        for &position in positions {
            category.push_trade(&trades[position], weight);
            self.assigned[position] += assignment.weight;
        }
    }
}

/// Trades distributed over the classifications of a taxonomy, plus a
/// category for the unassigned remainder
pub struct TradesGroupedByTaxonomy<'a> {
    taxonomy: &'a Taxonomy,
    categories: Vec<TradeCategory<'a>>,
}

impl<'a> TradesGroupedByTaxonomy<'a> {
    pub fn new(
        taxonomy: &'a Taxonomy,
        trades: &'a [Trade],
        context: &TradeContext<'a>,
    ) -> Result<Self, TradeError> {
        let mut by_security: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (position, trade) in trades.iter().enumerate() {
            by_security
                .entry(trade.security_uuid())
                .or_default()
                .push(position);
        }

        let mut builder = CategoryBuilder {
            context,
            trades,
            by_security,
            assigned: vec![0; trades.len()],
            categories: Vec::new(),
        };
        taxonomy.accept(&mut builder);

        let CategoryBuilder {
            assigned,
            categories,
            ..
        } = builder;

        let mut kept = Vec::with_capacity(categories.len() + 1);
        for mut category in categories {
            category.recompute()?;
            if category.trade_count() != 0 {
                kept.push(category);
            }
        }
        kept.sort_by_key(|c| {
            let rank = c.classification().rank;
            (rank.is_none(), rank)
        });

        let unassigned =
            Classification::new(UNASSIGNED_ID.to_string(), UNASSIGNED_NAME.to_string());
        let mut remainder = TradeCategory::new(Cow::Owned(unassigned), context);
        for (trade, weight) in trades.iter().zip(&assigned) {
            if *weight > ONE_HUNDRED_PERCENT {
                log::warn!(
                    "Trade in '{}' from {} is assigned {:.2}% in taxonomy '{}'",
                    trade.security_name(),
                    trade.start().date(),
                    *weight as f64 / 100.0,
                    taxonomy.name
                );
            } else if *weight < ONE_HUNDRED_PERCENT {
                let rest = (ONE_HUNDRED_PERCENT - weight) as f64 / ONE_HUNDRED_PERCENT as f64;
                remainder.push_trade(trade, rest);
            }
        }
        remainder.recompute()?;
        if remainder.trade_count() != 0 {
            kept.push(remainder);
        }

        log::debug!(
            "Grouped {} trades into {} categories of taxonomy '{}'",
            trades.len(),
            kept.len(),
            taxonomy.name
        );

        Ok(Self {
            taxonomy,
            categories: kept,
        })
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        self.taxonomy
    }

    pub fn as_list(&self) -> &[TradeCategory<'a>] {
        &self.categories
    }

    pub fn into_list(self) -> Vec<TradeCategory<'a>> {
        self.categories
    }
}
