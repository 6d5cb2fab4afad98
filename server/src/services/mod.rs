pub mod live_game_socket_service;
pub mod rooms;
