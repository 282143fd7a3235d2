// Serializable records exchanged with storage and viewers.

pub mod dto;
