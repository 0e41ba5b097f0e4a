#[derive(Debug, serde::Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct Event {
    pub event: EventInner,
}

#[derive(Debug, serde::Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub enum EventInner {
    TurnOn,
    TurnOff,

    SetBrightness(u8),

    /// Run exit and init again, dropping every ball from a fresh height.
    Restart,
}
