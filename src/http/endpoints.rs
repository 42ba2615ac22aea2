//! The gateway's HTTP surface: which path goes to which backend operation.

use axum::http::{Method, StatusCode};

use crate::backend::{BackendName, FailureKind};
use crate::routing::{PathPattern, Route, RouteTable};

/// How the request body is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRule {
    /// Ignored.
    None,
    /// Parsed if present; must be a JSON object.
    Optional,
    /// Must be a JSON object.
    Required,
}

/// How a successful backend payload is turned into the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    PassThrough,
    /// Hoist the fields of nested `tokens` and `user` objects to the top level.
    FlattenAuth,
}

/// One backend-backed endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub backend: BackendName,
    pub operation: &'static str,
    pub success: StatusCode,
    pub body: BodyRule,
    pub required_query: &'static [&'static str],
    pub paginated: bool,
    pub shape: ResponseShape,
    /// Kind used when the backend answers with an in-band `"error"` string.
    pub rejection: FailureKind,
}

impl Endpoint {
    pub const fn new(backend: BackendName, operation: &'static str) -> Self {
        Self {
            backend,
            operation,
            success: StatusCode::OK,
            body: BodyRule::None,
            required_query: &[],
            paginated: false,
            shape: ResponseShape::PassThrough,
            rejection: FailureKind::Internal,
        }
    }

    pub const fn created(mut self) -> Self {
        self.success = StatusCode::CREATED;
        self
    }

    pub const fn with_body(mut self) -> Self {
        self.body = BodyRule::Required;
        self
    }

    pub const fn optional_body(mut self) -> Self {
        self.body = BodyRule::Optional;
        self
    }

    pub const fn query(mut self, required: &'static [&'static str]) -> Self {
        self.required_query = required;
        self
    }

    pub const fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    pub const fn flatten_auth(mut self) -> Self {
        self.shape = ResponseShape::FlattenAuth;
        self
    }

    pub const fn rejects_as(mut self, kind: FailureKind) -> Self {
        self.rejection = kind;
        self
    }
}

/// What a route resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    /// Answered by the gateway itself from the health registry.
    Health,
    Backend(Endpoint),
}

fn route(method: Method, path: &str, handler: Handler) -> Route<Handler> {
    Route {
        method,
        pattern: PathPattern::parse(path),
        handler,
    }
}

/// Build the full route table.
pub fn route_table() -> RouteTable<Handler> {
    use BackendName::{Auth, Chat, Employee, Structure};
    use Handler::Backend as B;

    let get = |path: &str, e: Endpoint| route(Method::GET, path, B(e));
    let post = |path: &str, e: Endpoint| route(Method::POST, path, B(e));
    let put = |path: &str, e: Endpoint| route(Method::PUT, path, B(e));
    let delete = |path: &str, e: Endpoint| route(Method::DELETE, path, B(e));

    RouteTable::new(vec![
        route(Method::GET, "/health", Handler::Health),
        // auth
        post(
            "/register",
            Endpoint::new(Auth, "Register")
                .with_body()
                .flatten_auth()
                .rejects_as(FailureKind::InvalidInput),
        ),
        post(
            "/login",
            Endpoint::new(Auth, "Login")
                .with_body()
                .flatten_auth()
                .rejects_as(FailureKind::Unauthenticated),
        ),
        post(
            "/login-phone",
            Endpoint::new(Auth, "LoginByPhone")
                .with_body()
                .flatten_auth()
                .rejects_as(FailureKind::Unauthenticated),
        ),
        post(
            "/refresh",
            Endpoint::new(Auth, "Refresh")
                .with_body()
                .flatten_auth()
                .rejects_as(FailureKind::Unauthenticated),
        ),
        post(
            "/logout",
            Endpoint::new(Auth, "Logout")
                .with_body()
                .rejects_as(FailureKind::InvalidInput),
        ),
        post(
            "/auth/max",
            Endpoint::new(Auth, "AuthenticateMAX")
                .with_body()
                .flatten_auth()
                .rejects_as(FailureKind::Unauthenticated),
        ),
        post(
            "/auth/password-reset/request",
            Endpoint::new(Auth, "RequestPasswordReset")
                .with_body()
                .rejects_as(FailureKind::InvalidInput),
        ),
        post(
            "/auth/password-reset/confirm",
            Endpoint::new(Auth, "ResetPassword")
                .with_body()
                .rejects_as(FailureKind::InvalidInput),
        ),
        post(
            "/auth/password/change",
            Endpoint::new(Auth, "ChangePassword")
                .with_body()
                .rejects_as(FailureKind::InvalidInput),
        ),
        get("/bot/me", Endpoint::new(Auth, "GetBotMe")),
        get("/metrics", Endpoint::new(Auth, "GetMetrics")),
        // chat
        get("/chats", Endpoint::new(Chat, "GetAllChats").paginated()),
        get("/chats/all", Endpoint::new(Chat, "GetAllChats").paginated()),
        get(
            "/chats/search",
            Endpoint::new(Chat, "SearchChats").query(&["query"]).paginated(),
        ),
        post("/chats", Endpoint::new(Chat, "CreateChat").with_body().created()),
        get("/chats/{id}", Endpoint::new(Chat, "GetChatByID")),
        post(
            "/chats/{id}/administrators",
            Endpoint::new(Chat, "AddAdministrator").with_body().created(),
        ),
        post(
            "/chats/{id}/refresh-participants",
            Endpoint::new(Chat, "RefreshParticipantsCount").optional_body(),
        ),
        get("/administrators", Endpoint::new(Chat, "GetAllAdministrators").paginated()),
        post(
            "/administrators",
            Endpoint::new(Chat, "AddAdministrator").with_body().created(),
        ),
        get("/administrators/{id}", Endpoint::new(Chat, "GetAdministratorByID")),
        delete("/administrators/{id}", Endpoint::new(Chat, "RemoveAdministrator")),
        // employee
        get("/employees/all", Endpoint::new(Employee, "GetAllEmployees").paginated()),
        get(
            "/employees/search",
            Endpoint::new(Employee, "SearchEmployees").query(&["query"]).paginated(),
        ),
        post(
            "/employees/batch-update-maxid",
            Endpoint::new(Employee, "BatchUpdateMaxID").optional_body(),
        ),
        get("/employees/batch-status", Endpoint::new(Employee, "GetBatchStatus")),
        get("/employees/batch-status/{id}", Endpoint::new(Employee, "GetBatchStatusByID")),
        get("/employees/{id}", Endpoint::new(Employee, "GetEmployeeByID")),
        put("/employees/{id}", Endpoint::new(Employee, "UpdateEmployee").with_body()),
        delete("/employees/{id}", Endpoint::new(Employee, "DeleteEmployee")),
        post(
            "/simple-employee",
            Endpoint::new(Employee, "CreateEmployeeSimple").with_body().created(),
        ),
        post(
            "/create-employee",
            Endpoint::new(Employee, "CreateEmployee").with_body().created(),
        ),
        // structure
        get("/universities", Endpoint::new(Structure, "GetAllUniversities")),
        post(
            "/universities",
            Endpoint::new(Structure, "CreateUniversity").with_body().created(),
        ),
        get("/universities/{id}", Endpoint::new(Structure, "GetUniversityByID")),
        get(
            "/universities/{id}/structure",
            Endpoint::new(Structure, "GetUniversityStructure"),
        ),
        put(
            "/universities/{id}/name",
            Endpoint::new(Structure, "UpdateUniversityName").with_body(),
        ),
        post("/structure", Endpoint::new(Structure, "CreateStructure").with_body()),
        put("/branches/{id}/name", Endpoint::new(Structure, "UpdateBranchName").with_body()),
        put("/faculties/{id}/name", Endpoint::new(Structure, "UpdateFacultyName").with_body()),
        put("/groups/{id}/name", Endpoint::new(Structure, "UpdateGroupName").with_body()),
        put("/groups/{id}/chat", Endpoint::new(Structure, "LinkGroupToChat").with_body()),
        get(
            "/departments/managers",
            Endpoint::new(Structure, "GetAllDepartmentManagers"),
        ),
        post(
            "/departments/managers",
            Endpoint::new(Structure, "CreateDepartmentManager").with_body().created(),
        ),
        delete(
            "/departments/managers/{id}",
            Endpoint::new(Structure, "RemoveDepartmentManager"),
        ),
    ])
}
