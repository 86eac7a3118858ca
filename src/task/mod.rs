pub(crate) mod subscriber;
pub(crate) mod sweeper;
