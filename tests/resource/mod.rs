mod resource_service;
