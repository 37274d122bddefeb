mod outbound;

pub(crate) use outbound::OutboundEvent;
