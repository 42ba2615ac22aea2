//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes, most specific first
//! - Look up the route for a method and path
//! - Distinguish "no such path" from "path exists, wrong method"
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes (acceptable for typical route counts)
//! - Explicit NotFound rather than silent default

use axum::http::Method;

use crate::routing::matcher::{PathParams, PathPattern};

#[derive(Debug)]
pub struct Route<T> {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: T,
}

/// Lookup result.
#[derive(Debug)]
pub enum RouteMatch<'a, T> {
    Matched {
        route: &'a Route<T>,
        params: PathParams,
    },
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Ordered, immutable route table.
#[derive(Debug)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> RouteTable<T> {
    pub fn new(mut routes: Vec<Route<T>>) -> Self {
        // Stable: routes with equal specificity keep declaration order.
        routes.sort_by_key(|r| r.pattern.specificity());
        Self { routes }
    }

    pub fn routes(&self) -> &[Route<T>] {
        &self.routes
    }

    /// The most specific pattern matching `path` decides; its method set
    /// determines the answer.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_, T> {
        let Some((pattern, params)) = self
            .routes
            .iter()
            .find_map(|r| r.pattern.matches(path).map(|p| (&r.pattern, p)))
        else {
            return RouteMatch::NotFound;
        };

        let mut allowed = Vec::new();
        for route in self.routes.iter().filter(|r| &r.pattern == pattern) {
            if route.method == *method {
                return RouteMatch::Matched { route, params };
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }
        RouteMatch::MethodNotAllowed(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable<&'static str> {
        let route = |method: Method, path: &str, handler| Route {
            method,
            pattern: PathPattern::parse(path),
            handler,
        };
        RouteTable::new(vec![
            route(Method::GET, "/chats/{id}", "chat-by-id"),
            route(Method::GET, "/chats/search", "search"),
            route(Method::GET, "/chats", "list"),
            route(Method::POST, "/chats", "create"),
            route(Method::DELETE, "/administrators/{id}", "remove-admin"),
        ])
    }

    #[test]
    fn literal_beats_parameter_regardless_of_order() {
        match table().lookup(&Method::GET, "/chats/search") {
            RouteMatch::Matched { route, .. } => assert_eq!(route.handler, "search"),
            other => panic!("unexpected {:?}", other),
        }
        match table().lookup(&Method::GET, "/chats/17/") {
            RouteMatch::Matched { route, params } => {
                assert_eq!(route.handler, "chat-by-id");
                assert_eq!(params.get("id"), Some("17"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn method_mismatch_lists_allowed_methods() {
        match table().lookup(&Method::PUT, "/chats") {
            RouteMatch::MethodNotAllowed(allowed) => assert_eq!(allowed, vec![Method::GET, Method::POST]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert!(matches!(table().lookup(&Method::GET, "/nope"), RouteMatch::NotFound));
        assert!(matches!(table().lookup(&Method::GET, "/"), RouteMatch::NotFound));
    }
}
