//! Tick-driven backtest broker: the simulation loop.
//!
//! Per tick:
//! 1. Gap: cancel every open position (margin back, no PnL)
//! 2. Close-trigger pass over open positions
//! 3. Candle completion per registered timeframe, shortest first, with
//!    callbacks invoked in registration order
//!
//! After the last tick every remaining position is closed at that tick.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Span};

use crate::dataset::Dataset;
use crate::domain::{CloseReason, Order, Position, PositionId, Tick, Timeframe};
use crate::engine::aggregator::candle_closing_at;
use crate::engine::broker::{
    BacktestBroker, Broker, BrokerConfig, BrokerError, CallbackHandle, MarketDataCallback,
};
use crate::engine::ledger::PositionLedger;
use crate::engine::state::{RunCounters, RunSummary};

struct Registration {
    handle: CallbackHandle,
    callback: Box<dyn MarketDataCallback>,
}

pub struct TickBroker {
    dataset: Arc<Dataset>,
    config: BrokerConfig,
    ledger: PositionLedger,
    index: usize,
    callbacks: BTreeMap<Timeframe, Vec<Registration>>,
    next_handle: usize,
    counters: RunCounters,
    finished: bool,
    span: Span,
}

impl TickBroker {
    pub fn new(dataset: Arc<Dataset>, config: BrokerConfig) -> Result<Self, BrokerError> {
        config.validate()?;
        // Dataset guarantees at least one tick.
        let span = info_span!("backtest", symbol = %dataset.symbol());
        Ok(Self {
            ledger: PositionLedger::new(config.initial_capital, config.leverage),
            dataset,
            config,
            index: 0,
            callbacks: BTreeMap::new(),
            next_handle: 0,
            counters: RunCounters::default(),
            finished: false,
            span,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    /// Full position history, in opening order.
    pub fn positions(&self) -> &[Position] {
        self.ledger.positions()
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.ledger.into_positions()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn current_tick(&self) -> Tick {
        self.dataset.ticks()[self.index]
    }

    fn process_tick(&mut self) {
        let tick = self.current_tick();
        self.counters.ticks_processed += 1;

        if tick.is_gap {
            self.counters.gap_ticks += 1;
            self.log_gap(&tick);
            let canceled = self.ledger.cancel_all(tick.timestamp);
            if !canceled.is_empty() {
                warn!(count = canceled.len(), at = %tick.timestamp, "positions canceled on gap");
            }
        }

        self.ledger.close_triggered(&tick);
        self.dispatch_candles();
    }

    fn log_gap(&self, tick: &Tick) {
        let Some(previous) = self.index.checked_sub(1).map(|i| self.dataset.ticks()[i]) else {
            return;
        };
        if previous.is_gap {
            let secs = (tick.timestamp - previous.timestamp).num_seconds();
            debug!(at = %tick.timestamp, previous = %previous.timestamp, secs, "gap in tick data");
        }
    }

    fn dispatch_candles(&mut self) {
        let timeframes: Vec<Timeframe> = self.callbacks.keys().copied().collect();
        for timeframe in timeframes {
            let Some(candle) = candle_closing_at(self.dataset.ticks(), self.index, timeframe) else {
                continue;
            };
            self.counters.candles_dispatched += 1;

            // Take the list out so callbacks can borrow the broker mutably.
            let mut registrations = match self.callbacks.get_mut(&timeframe) {
                Some(list) => mem::take(list),
                None => continue,
            };
            for registration in registrations.iter_mut() {
                registration.callback.on_candle(self, &candle);
            }

            let list = self.callbacks.entry(timeframe).or_default();
            let added = mem::replace(list, registrations);
            list.extend(added);
        }
    }

    fn summary(&self) -> RunSummary {
        let positions = self.ledger.positions();
        RunSummary {
            symbol: self.dataset.symbol().to_string(),
            counters: self.counters.clone(),
            positions_closed: positions.iter().filter(|p| p.is_closed()).count(),
            positions_canceled: positions.iter().filter(|p| p.is_canceled()).count(),
            initial_capital: self.config.initial_capital,
            final_capital: self.ledger.capital(),
        }
    }
}

impl Broker for TickBroker {
    fn lot_size(&self) -> u32 {
        self.config.lot_size
    }

    fn leverage(&self) -> f64 {
        self.config.leverage
    }

    fn capital(&self) -> f64 {
        self.ledger.capital()
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.current_tick().timestamp
    }

    fn register_market_data_callback(
        &mut self,
        timeframe: Timeframe,
        callback: Box<dyn MarketDataCallback>,
    ) -> CallbackHandle {
        let handle = CallbackHandle(self.next_handle);
        self.next_handle += 1;
        self.callbacks
            .entry(timeframe)
            .or_default()
            .push(Registration { handle, callback });
        debug!(handle = handle.0, %timeframe, "callback registered");
        handle
    }

    fn place_order(&mut self, order: Order) -> Result<PositionId, BrokerError> {
        if self.finished {
            self.counters.orders_rejected += 1;
            warn!(direction = %order.direction, "order after end of run rejected");
            return Err(BrokerError::RunFinished);
        }
        let tick = self.current_tick();
        match self.ledger.open(&order, &tick) {
            Ok(id) => {
                self.counters.orders_placed += 1;
                Ok(id)
            }
            Err(err) => {
                self.counters.orders_rejected += 1;
                warn!(error = %err, direction = %order.direction, "order rejected");
                Err(err)
            }
        }
    }

    fn position(&self, id: PositionId) -> Option<&Position> {
        self.ledger.position(id)
    }
}

impl BacktestBroker for TickBroker {
    fn run(&mut self) -> RunSummary {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.finished {
            return self.summary();
        }

        let tick_count = self.dataset.tick_count();
        info!(
            ticks = tick_count,
            begin = %self.dataset.begin_date(),
            end = %self.dataset.end_date(),
            "run started"
        );

        for i in 0..tick_count {
            self.index = i;
            self.process_tick();
        }

        let last = self.current_tick();
        let forced = self.ledger.close_all(&last, CloseReason::EndOfRun);
        if !forced.is_empty() {
            debug!(count = forced.len(), "positions closed at end of run");
        }
        self.finished = true;

        let summary = self.summary();
        info!(
            closed = summary.positions_closed,
            canceled = summary.positions_canceled,
            final_capital = summary.final_capital,
            net_pnl = summary.net_pnl(),
            "run finished"
        );
        summary
    }
}

impl std::fmt::Debug for TickBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handles: Vec<usize> = self
            .callbacks
            .values()
            .flatten()
            .map(|r| r.handle.0)
            .collect();
        f.debug_struct("TickBroker")
            .field("symbol", &self.dataset.symbol())
            .field("index", &self.index)
            .field("capital", &self.ledger.capital())
            .field("open_positions", &self.ledger.open_count())
            .field("callbacks", &handles)
            .field("finished", &self.finished)
            .finish()
    }
}
