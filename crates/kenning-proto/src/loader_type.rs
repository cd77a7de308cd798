//! Loader type tag and the fixed message-type → loader-type mapping.

/// Which kind of destination a message's payload streams into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderType {
    /// No loader: the message carries no streamed payload destination.
    None,
    /// Input tensor data.
    Data,
    /// Model weights.
    Model,
    /// Model input/output specification.
    Iospec,
    /// Runtime extension binary.
    Runtime,
}

impl crate::MessageType {
    /// The loader type associated with this message type, per the fixed
    /// table in the protocol definition.
    #[must_use]
    pub fn loader_type(self) -> LoaderType {
        use crate::MessageType::{
            Data, Iospec, Model, OptimizeModel, Optimizers, Output, Ping, Process, Runtime, Stats,
            Status, UnoptimizedModel,
        };
        match self {
            Ping | Status | Process | Output | Stats | Optimizers | OptimizeModel
            | UnoptimizedModel | Self::Logs => LoaderType::None,
            Data => LoaderType::Data,
            Model => LoaderType::Model,
            Iospec => LoaderType::Iospec,
            Runtime => LoaderType::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageType;

    #[test]
    fn matches_fixed_table() {
        assert_eq!(MessageType::Ping.loader_type(), LoaderType::None);
        assert_eq!(MessageType::Data.loader_type(), LoaderType::Data);
        assert_eq!(MessageType::Model.loader_type(), LoaderType::Model);
        assert_eq!(MessageType::Iospec.loader_type(), LoaderType::Iospec);
        assert_eq!(MessageType::Runtime.loader_type(), LoaderType::Runtime);
        assert_eq!(MessageType::Stats.loader_type(), LoaderType::None);
    }
}
