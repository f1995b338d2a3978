pub const LOGO: &str = "
                  888
                  888
88888b.   .d88b.  888 888
888 '88b d88P'88b 888 888
888  888 888  888 888 888
888 d88P Y88b 888 888 888
88888P'   'Y88888 888 888
888           888     888
888      Y8b d88P     888
888       'Y88P'      888
";

/// The publicly visible name of the server
pub const PKG_NAME: &str = "pgql";

/// The version of the server
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The address the server listens on when none is given
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// The route which serves GraphQL requests when none is given
pub const DEFAULT_GRAPHQL_ROUTE: &str = "/graphql";

/// The route which serves GraphiQL when none is given
pub const DEFAULT_GRAPHIQL_ROUTE: &str = "/graphiql";

/// The default maximum size of a request body
pub const DEFAULT_BODY_SIZE_LIMIT: &str = "100kB";
