//! Filter-driven dispatch: candidates, filters, routes.

mod filter;
mod route;

pub use filter::{Candidate, Filter};
pub use route::{Route, RouteError, RouteTable, RouteTableBuilder};
