use std::convert::Infallible;
use std::sync::Arc;

use scopekit::prelude::*;

pub struct Test1;

#[component]
impl Test1 {
    #[inject]
    pub fn new() -> Self {
        todo!()
    }
}

pub struct Test2;

#[component]
impl Test2 {
    #[inject]
    pub fn new() -> Test2 {
        todo!()
    }
}

pub struct Test3;

#[component]
impl Test3 {
    #[inject]
    pub fn new() -> Result<Self, Infallible> {
        todo!()
    }
}

pub struct Test4;

#[component]
impl Test4 {
    #[inject]
    pub fn new() -> Result<Test4, Infallible> {
        todo!()
    }
}

pub struct Test5;

#[component]
impl Test5 {
    #[inject]
    pub fn new() -> std::result::Result<Test5, Infallible> {
        todo!()
    }
}

pub struct Test6;

#[component]
impl Test6 {
    #[inject]
    pub fn new(_first: Arc<Test1>, #[optional] _second: Option<Arc<Test2>>) -> Self {
        todo!()
    }
}

pub trait Marker: Send + Sync + 'static {}

pub struct Test7;

impl Marker for Test7 {}

#[component(Arc<dyn Marker>, Arc::new)]
impl Test7 {
    #[inject]
    pub fn new() -> Result<Self, std::io::Error> {
        todo!()
    }
}

fn main() {}
