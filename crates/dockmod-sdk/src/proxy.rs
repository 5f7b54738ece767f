//! nginx reverse proxy fronting the published ports of Compose services.

use dockmod_common::error::Result;
use dockmod_common::types::Protocol;
use dockmod_engine::container::Container;
use dockmod_engine::engine::ContainerEngine;

const NGINX_CONF: &str = r"user  nginx;
worker_processes  auto;

error_log  /var/log/nginx/error.log notice;
pid        /var/run/nginx.pid;

events {
    worker_connections  1024;
}

include /etc/nginx/stream.conf;

http {
    include       /etc/nginx/mime.types;
    default_type  application/octet-stream;

    access_log  /var/log/nginx/access.log;

    sendfile        on;
    keepalive_timeout  65;

    include /etc/nginx/conf.d/*.conf;
}
";

const STREAM_CONF: &str = r"stream {
    include /etc/nginx/stream.d/*.conf;
}
";

/// One listener of the proxy forwarding to a service port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Service name, also the host the proxy forwards to.
    pub name: String,
    /// Port the proxy listens on.
    pub frontend: u16,
    /// Port of the service receiving traffic.
    pub backend: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl Route {
    /// Returns the path of the route's configuration fragment.
    pub fn config_path(&self) -> String {
        match self.protocol {
            Protocol::Tcp => format!("/etc/nginx/conf.d/{}_{}.conf", self.name, self.frontend),
            Protocol::Udp => format!("/etc/nginx/stream.d/{}_{}.conf", self.name, self.frontend),
        }
    }

    /// Renders the route's configuration fragment.
    pub fn config(&self) -> String {
        let Self {
            name,
            frontend,
            backend,
            protocol,
        } = self;
        match protocol {
            Protocol::Tcp => format!(
                "server {{
    listen {frontend};
    listen [::]:{frontend};

    server_name {name};

    location / {{
        proxy_pass http://{name}:{backend};
        proxy_set_header Host $http_host;
        proxy_set_header X-Forwarded-Host $http_host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"
            ),
            Protocol::Udp => format!(
                "server {{
    listen {frontend} udp;
    listen [::]:{frontend} udp;
    proxy_pass {name}:{backend};
}}
"
            ),
        }
    }
}

/// Builder of the proxy container.
#[derive(Debug, Clone)]
pub struct Proxy {
    container: Container,
}

impl Proxy {
    /// Starts a proxy from `image` with the base nginx configuration.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the image cannot be resolved.
    pub fn new(engine: &dyn ContainerEngine, image: &str) -> Result<Self> {
        let container = engine
            .from_image(image)?
            .with_new_file("/etc/nginx/stream.conf", STREAM_CONF)
            .with_new_file("/etc/nginx/nginx.conf", NGINX_CONF);
        Ok(Self { container })
    }

    /// Routes `route` to `service` and exposes the frontend port.
    #[must_use]
    pub fn with_route(self, route: &Route, service: &Container) -> Self {
        tracing::debug!(
            service = %route.name,
            frontend = route.frontend,
            backend = route.backend,
            protocol = %route.protocol,
            "adding proxy route"
        );
        Self {
            container: self
                .container
                .with_new_file(route.config_path(), route.config())
                .with_service_binding(route.name.clone(), service)
                .with_exposed_port(route.frontend, route.protocol),
        }
    }

    /// Returns the proxy container, running nginx in the foreground.
    #[must_use]
    pub fn into_container(self) -> Container {
        self.container.with_default_args(vec![
            "nginx".to_string(),
            "-g".to_string(),
            "daemon off;".to_string(),
        ])
    }
}
