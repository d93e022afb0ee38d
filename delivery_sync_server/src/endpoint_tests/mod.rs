mod delivery;
mod helpers;
mod mocks;
mod webhook;
