pub mod boards;
pub mod columns;
pub mod error;
pub mod leads;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod webhook;
