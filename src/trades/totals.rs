//! Summary figures over all trades

use std::borrow::Cow;

use super::category::TradeCategory;
use super::error::TradeError;
use super::trade::Trade;
use super::TradeContext;
use crate::pp::common::{round_half_up, Money, PRICE_FACTOR};
use crate::pp::Classification;

/// Id of the synthetic classification holding every trade
pub const ALL_TRADES_ID: &str = "$all$";

#[derive(Debug)]
pub struct TradeTotals<'a> {
    all_trades: TradeCategory<'a>,
    total_shares: i64,
    total_entry_value: Money,
    total_exit_value: Money,
    total_profit_loss: Money,
    total_profit_loss_without_taxes_and_fees: Money,
    total_profit_loss_moving_average: Money,
    total_profit_loss_moving_average_without_taxes_and_fees: Money,
}

impl<'a> TradeTotals<'a> {
    pub fn new(trades: &'a [Trade], context: &TradeContext<'a>) -> Result<Self, TradeError> {
        let classification = Classification::new(ALL_TRADES_ID.to_string(), "All".to_string());
        let mut all_trades = TradeCategory::new(Cow::Owned(classification), context);
        for trade in trades {
            all_trades.push_trade(trade, 1.0);
        }
        all_trades.recompute()?;

        let converter = context.converter;
        let term = converter.term_currency();

        let mut entry = Vec::with_capacity(trades.len());
        let mut exit = Vec::with_capacity(trades.len());
        let mut profit_loss = Vec::with_capacity(trades.len());
        let mut profit_loss_net = Vec::with_capacity(trades.len());
        let mut profit_loss_ma = Vec::with_capacity(trades.len());
        let mut profit_loss_ma_net = Vec::with_capacity(trades.len());

        for trade in trades {
            let start = trade.start().date();
            let end = trade.end_or(context.today);
            entry.push(converter.convert(start, trade.entry_value())?);
            exit.push(converter.convert(end, trade.exit_value())?);
            profit_loss.push(converter.convert(end, &trade.profit_loss())?);
            profit_loss_net
                .push(converter.convert(end, &trade.profit_loss_without_taxes_and_fees())?);
            profit_loss_ma.push(converter.convert(end, &trade.profit_loss_moving_average())?);
            profit_loss_ma_net.push(converter.convert(
                end,
                &trade.profit_loss_moving_average_without_taxes_and_fees(),
            )?);
        }

        Ok(Self {
            all_trades,
            total_shares: trades.iter().map(Trade::shares).sum(),
            total_entry_value: Money::sum(term, &entry),
            total_exit_value: Money::sum(term, &exit),
            total_profit_loss: Money::sum(term, &profit_loss),
            total_profit_loss_without_taxes_and_fees: Money::sum(term, &profit_loss_net),
            total_profit_loss_moving_average: Money::sum(term, &profit_loss_ma),
            total_profit_loss_moving_average_without_taxes_and_fees: Money::sum(
                term,
                &profit_loss_ma_net,
            ),
        })
    }

    /// Category statistics (IRR, win rate, holding period) over all trades
    pub fn all_trades(&self) -> &TradeCategory<'a> {
        &self.all_trades
    }

    pub fn trade_count(&self) -> i64 {
        self.all_trades.trade_count()
    }

    pub fn total_shares(&self) -> i64 {
        self.total_shares
    }

    pub fn total_entry_value(&self) -> &Money {
        &self.total_entry_value
    }

    pub fn total_exit_value(&self) -> &Money {
        &self.total_exit_value
    }

    pub fn total_profit_loss(&self) -> &Money {
        &self.total_profit_loss
    }

    pub fn total_profit_loss_without_taxes_and_fees(&self) -> &Money {
        &self.total_profit_loss_without_taxes_and_fees
    }

    pub fn total_profit_loss_moving_average(&self) -> &Money {
        &self.total_profit_loss_moving_average
    }

    pub fn total_profit_loss_moving_average_without_taxes_and_fees(&self) -> &Money {
        &self.total_profit_loss_moving_average_without_taxes_and_fees
    }

    /// Entry value per share, `None` without shares
    pub fn average_entry_price(&self) -> Option<Money> {
        self.per_share(&self.total_entry_value)
    }

    /// Exit value per share, `None` without shares
    pub fn average_exit_price(&self) -> Option<Money> {
        self.per_share(&self.total_exit_value)
    }

    fn per_share(&self, value: &Money) -> Option<Money> {
        if self.total_shares == 0 {
            return None;
        }
        let amount = value.amount as f64 * PRICE_FACTOR as f64 / self.total_shares as f64;
        Some(Money::new(round_half_up(amount), value.currency.clone()))
    }
}
