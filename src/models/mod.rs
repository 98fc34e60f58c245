pub mod account;
pub mod application;
pub mod context_item;
pub mod conversation;
pub mod database;
pub mod event;
pub mod frame;
pub mod turn;
pub mod validation;

pub use account::{LoginRequest, RegisterRequest, Role, Token, User, UserCreate, UserList, UserUpdate};
pub use application::{AppType, Application, ApplicationPayload};
pub use context_item::ContextItem;
pub use conversation::{Conversation, Message, Sender};
pub use database::{DatabaseStatus, InitStep, InitializeResponse};
pub use event::{ArcEventTx, Event, EventTx};
pub use frame::{FrameError, FrameEvent, StreamFrame};
pub use turn::{TurnAccumulator, TurnSnapshot, TurnState};
pub use validation::ValidationError;
