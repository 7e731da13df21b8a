pub mod publisher;
pub mod rabbitmq;
pub mod topology;

pub use publisher::{JobPublisher, MessagePublisher, NotificationPublisher};
pub use rabbitmq::RabbitMqService;
pub use topology::TopologyManager;
