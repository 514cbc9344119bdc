/// Card mutations over an in-memory board. Nothing here touches storage.
pub mod batch;
pub mod cards;
pub mod position;
pub mod reference;
