#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod policy;

pub use self::labels::{InvalidSelector, Labels, Selector};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Namespace, Pod, PodSpec, PodStatus},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
pub use kube::ResourceExt;
