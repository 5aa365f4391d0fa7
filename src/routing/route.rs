//! Routes and the route table.
//!
//! A route pairs a filter with a destination and a transfer policy. The
//! table is built once through a builder that validates name uniqueness and
//! destination references, then stays immutable; dispatch is single-route
//! (more than one matching route for a file is an error, not a pick).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::filter::{Candidate, Filter};
use crate::storage::StorageHandle;
use crate::transfer::{Condition, TransferRequest};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Duplicate route name: '{0}'")]
    DuplicateRoute(String),

    #[error("Route '{route}' references unknown destination '{destination}'")]
    UnknownDestination { route: String, destination: String },

    #[error("Multiple routes match '{path}': {names:?}")]
    MultipleRoutes { path: PathBuf, names: Vec<String> },
}

/// One named dispatch target. The condition is constructor-required: a route
/// without an explicit policy cannot be expressed.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    filter: Filter,
    destination: String,
    dest_dir: PathBuf,
    condition: Condition,
    preserve_time: bool,
    cleanup_destination_on_error: bool,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        filter: Filter,
        destination: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        condition: Condition,
    ) -> Self {
        Self {
            name: name.into(),
            filter,
            destination: destination.into(),
            dest_dir: dest_dir.into(),
            condition,
            preserve_time: false,
            cleanup_destination_on_error: true,
        }
    }

    pub fn preserve_time(mut self, yes: bool) -> Self {
        self.preserve_time = yes;
        self
    }

    pub fn cleanup_destination_on_error(mut self, yes: bool) -> Self {
        self.cleanup_destination_on_error = yes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Destination path for a given source file: the route directory plus the
    /// source file name.
    pub fn dest_path(&self, src_path: &Path) -> PathBuf {
        match src_path.file_name() {
            Some(name) => self.dest_dir.join(name),
            None => self.dest_dir.clone(),
        }
    }
}

/// Immutable dispatch configuration: named destination handles plus routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    destinations: HashMap<String, StorageHandle>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn destination(&self, name: &str) -> Option<&StorageHandle> {
        self.destinations.get(name)
    }

    /// Whether any route's filter needs candidate content loaded.
    pub fn needs_payload(&self) -> bool {
        self.routes.iter().any(|r| r.filter.needs_payload())
    }

    /// All routes whose filter matches the candidate.
    pub fn matching(&self, candidate: &Candidate) -> Vec<&Route> {
        self.routes
            .iter()
            .filter(|r| r.filter.matches(candidate))
            .collect()
    }

    /// Single-route dispatch: at most one route may claim a candidate.
    pub fn dispatch(&self, candidate: &Candidate) -> Result<Option<&Route>, RouteError> {
        let matched = self.matching(candidate);
        match matched.as_slice() {
            [] => Ok(None),
            [route] => Ok(Some(route)),
            many => Err(RouteError::MultipleRoutes {
                path: candidate.path().to_path_buf(),
                names: many.iter().map(|r| r.name.clone()).collect(),
            }),
        }
    }

    /// Assemble the transfer request a matched route implies.
    pub fn request_for(
        &self,
        route: &Route,
        src: &StorageHandle,
        src_path: &Path,
    ) -> Option<TransferRequest> {
        let dst = self.destination(&route.destination)?;
        Some(
            TransferRequest::new(
                src.clone(),
                src_path,
                dst.clone(),
                route.dest_path(src_path),
                route.condition,
            )
            .preserve_time(route.preserve_time)
            .cleanup_destination_on_error(route.cleanup_destination_on_error),
        )
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
    destinations: HashMap<String, StorageHandle>,
}

impl RouteTableBuilder {
    /// Register a named destination handle. Later registrations win; routes
    /// are checked against the final set at build time.
    pub fn destination(mut self, name: impl Into<String>, handle: StorageHandle) -> Self {
        self.destinations.insert(name.into(), handle);
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Validate and freeze. Route names must be unique and every route must
    /// reference a registered destination.
    pub fn build(self) -> Result<RouteTable, RouteError> {
        let mut seen = HashMap::new();
        for route in &self.routes {
            if seen.insert(route.name.clone(), ()).is_some() {
                return Err(RouteError::DuplicateRoute(route.name.clone()));
            }
            if !self.destinations.contains_key(&route.destination) {
                return Err(RouteError::UnknownDestination {
                    route: route.name.clone(),
                    destination: route.destination.clone(),
                });
            }
        }
        Ok(RouteTable {
            routes: self.routes,
            destinations: self.destinations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemFs;

    fn table_with(routes: Vec<Route>) -> Result<RouteTable, RouteError> {
        let mut builder = RouteTable::builder().destination("archive", MemFs::new());
        for r in routes {
            builder = builder.route(r);
        }
        builder.build()
    }

    #[test]
    fn duplicate_route_name_fails_build() {
        let err = table_with(vec![
            Route::new("r", Filter::Any, "archive", "a", Condition::Always),
            Route::new("r", Filter::Any, "archive", "b", Condition::Always),
        ])
        .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute(ref n) if n == "r"));
    }

    #[test]
    fn unknown_destination_fails_build() {
        let err = table_with(vec![Route::new(
            "r",
            Filter::Any,
            "nowhere",
            "a",
            Condition::Always,
        )])
        .unwrap_err();
        assert!(
            matches!(err, RouteError::UnknownDestination { ref route, ref destination }
                if route == "r" && destination == "nowhere")
        );
    }

    #[test]
    fn dispatch_is_single_route() {
        let table = table_with(vec![
            Route::new(
                "hello",
                Filter::NameContains("Hello World".to_string()),
                "archive",
                "hello",
                Condition::Always,
            ),
            Route::new(
                "catch-all",
                Filter::Any,
                "archive",
                "misc",
                Condition::Always,
            ),
        ])
        .unwrap();

        // Only the catch-all matches this one.
        let plain = Candidate::new("file_1.txt");
        let route = table.dispatch(&plain).unwrap().unwrap();
        assert_eq!(route.name(), "catch-all");

        // Both match: refuse to pick.
        let hello = Candidate::new("Hello World.txt");
        let err = table.dispatch(&hello).unwrap_err();
        assert!(matches!(err, RouteError::MultipleRoutes { ref names, .. }
            if names == &["hello".to_string(), "catch-all".to_string()]));
    }

    #[test]
    fn no_route_is_ok_none() {
        let table = table_with(vec![Route::new(
            "csv",
            Filter::Extension("csv".to_string()),
            "archive",
            "csv",
            Condition::Always,
        )])
        .unwrap();
        assert!(table.dispatch(&Candidate::new("a.txt")).unwrap().is_none());
    }

    #[test]
    fn dest_path_appends_file_name() {
        let route = Route::new("r", Filter::Any, "archive", "sorted", Condition::Always);
        assert_eq!(
            route.dest_path(Path::new("in/sub/report.csv")),
            PathBuf::from("sorted/report.csv")
        );
    }

    #[test]
    fn request_for_carries_route_policy() {
        let table = table_with(vec![Route::new(
            "r",
            Filter::Any,
            "archive",
            "sorted",
            Condition::NotExists,
        )
        .preserve_time(true)])
        .unwrap();

        let src = MemFs::new();
        let route = table.routes().first().unwrap();
        let req = table
            .request_for(route, &src, Path::new("a.txt"))
            .unwrap();
        assert_eq!(req.condition, Condition::NotExists);
        assert!(req.preserve_time);
        assert!(req.cleanup_destination_on_error);
        assert_eq!(req.dst_path, PathBuf::from("sorted/a.txt"));
    }
}
