//! Minimal Docker engine client speaking HTTP (hyper) over the tunnel's local socket

mod client;

pub use client::{ContainerSummary, DockerClient};
