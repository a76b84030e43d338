//! # Calculator
//!
//! Answers [`Double`] queries, and [`Calculate`] notifications through the acknowledgment
//! protocol: every `Calculate` is answered with a [`CalculationDone`] carrying the same
//! acknowledgment id, and a retried `Calculate` gets the recorded answer back without being
//! computed again. [`GetStats`] reports how many calculations were actually performed.

use crate::framework::{
    Actor, ActorError, Context, Envelope, Message, Notification, Request, Response, Router,
};
use crate::reliable::{AckId, AckStore, Acknowledgeable};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Double {
    pub value: i64,
}

impl Message for Double {
    const TYPE: &'static str = "demo.Double";
}

impl Request for Double {
    type Response = Doubled;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doubled {
    pub value: i64,
}

impl Message for Doubled {
    const TYPE: &'static str = "demo.Doubled";
}

impl Response for Doubled {}

/// Squares `value`; answered with [`CalculationDone`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculate {
    pub ack_id: AckId,
    pub value: i64,
}

impl Message for Calculate {
    const TYPE: &'static str = "demo.Calculate";

    fn ack_id(&self) -> Option<AckId> {
        Some(self.ack_id)
    }
}

impl Notification for Calculate {}
impl Acknowledgeable for Calculate {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationDone {
    pub ack_id: AckId,
    pub result: i64,
}

impl Message for CalculationDone {
    const TYPE: &'static str = "demo.CalculationDone";

    fn ack_id(&self) -> Option<AckId> {
        Some(self.ack_id)
    }
}

impl Notification for CalculationDone {}
impl Acknowledgeable for CalculationDone {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStats;

impl Message for GetStats {
    const TYPE: &'static str = "demo.GetStats";
}

impl Request for GetStats {
    type Response = Stats;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Calculations performed, duplicates excluded.
    pub computed: u64,
}

impl Message for Stats {
    const TYPE: &'static str = "demo.Stats";
}

impl Response for Stats {}

#[derive(Default)]
pub struct Calculator {
    done: AckStore<CalculationDone>,
    computed: u64,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    fn double(
        &mut self,
        _ctx: &mut Context<'_>,
        _envelope: &Envelope,
        double: &Double,
    ) -> Result<Doubled, ActorError> {
        let value = double
            .value
            .checked_mul(2)
            .ok_or_else(|| format!("{} cannot be doubled", double.value))?;
        Ok(Doubled { value })
    }

    fn calculate(
        &mut self,
        ctx: &mut Context<'_>,
        envelope: &Envelope,
        calculate: &Calculate,
    ) -> Result<(), ActorError> {
        let Some(sender) = envelope.sender() else {
            warn!(ack_id = %calculate.ack_id, "Calculate without sender, dropped");
            return Ok(());
        };
        let result = calculate.value.saturating_mul(calculate.value);
        self.computed += 1;
        debug!(ack_id = %calculate.ack_id, value = calculate.value, result, "Calculated");
        self.done.send(
            ctx,
            sender,
            CalculationDone {
                ack_id: calculate.ack_id,
                result,
            },
        )?;
        Ok(())
    }

    fn stats(
        &mut self,
        _ctx: &mut Context<'_>,
        _envelope: &Envelope,
        _request: &GetStats,
    ) -> Result<Stats, ActorError> {
        Ok(Stats {
            computed: self.computed,
        })
    }
}

fn router() -> &'static Router<Calculator> {
    static ROUTER: OnceLock<Router<Calculator>> = OnceLock::new();
    ROUTER.get_or_init(|| {
        Router::new()
            .request(Calculator::double)
            .request(Calculator::stats)
            .notification(Calculator::calculate)
    })
}

impl Actor for Calculator {
    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        if self.done.send_if_acknowledged(ctx, envelope) {
            return Ok(());
        }
        router().dispatch(self, ctx, envelope)
    }
}
