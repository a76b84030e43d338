use crate::framework::{
    Actor, ActorError, Context, Envelope, Message, Request, Response, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greet {
    pub name: String,
}

impl Message for Greet {
    const TYPE: &'static str = "demo.Greet";
}

impl Request for Greet {
    type Response = Greeting;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub text: String,
}

impl Message for Greeting {
    const TYPE: &'static str = "demo.Greeting";
}

impl Response for Greeting {}

/// Answers [`Greet`] with a greeting naming the process it runs on.
#[derive(Default)]
pub struct Greeter;

impl Greeter {
    fn greet(
        &mut self,
        ctx: &mut Context<'_>,
        _envelope: &Envelope,
        greet: &Greet,
    ) -> Result<Greeting, ActorError> {
        Ok(Greeting {
            text: format!(
                "Hello, {}! (from process {})",
                greet.name,
                ctx.world().process().id_string()
            ),
        })
    }
}

fn router() -> &'static Router<Greeter> {
    static ROUTER: OnceLock<Router<Greeter>> = OnceLock::new();
    ROUTER.get_or_init(|| Router::new().request(Greeter::greet))
}

impl Actor for Greeter {
    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        router().dispatch(self, ctx, envelope)
    }
}
