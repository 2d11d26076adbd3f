pub mod ledger_node_service;

pub use ledger_node_service::LedgerNodeService;
