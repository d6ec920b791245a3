// Messaging - Lock-free queues between the control thread and the audio thread

pub mod channels;
pub mod command;
pub mod notification;
